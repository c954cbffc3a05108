use sqlx::PgPool;

/// Postgres-backed store handle.
///
/// Every query or command is a plain struct in `entities`, executed through
/// `kanau::processor::Processor` on this type. Cloning only clones the pool
/// handle.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
