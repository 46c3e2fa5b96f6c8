use std::sync::Arc;

use evlog::meta;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::runtime::get_logger;

static SHARED: OnceCell<Arc<DBClient>> = OnceCell::const_new();

pub struct DBClient {
    pool: PgPool,
}

impl DBClient {
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    /// Pool that connects on first use, without running migrations.
    #[cfg(test)]
    pub fn lazy(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub fn conn(&self) -> &PgPool {
        &self.pool
    }
}

/// Process-wide client, connected on first use and kept for the life of the
/// process. Later calls return the same client regardless of arguments.
pub async fn shared(url: &str, max_connections: u32) -> anyhow::Result<Arc<DBClient>> {
    let client = SHARED.get_or_try_init(|| async {
        get_logger().info("Connecting to database.", meta! {
            "MaxConnections" => max_connections,
        });
        DBClient::new(url, max_connections).await.map(Arc::new)
    }).await?;

    Ok(client.clone())
}
