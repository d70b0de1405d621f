//! Product Repository

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::Product;

#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, id: &str, name: &str, price: f64, stock: i64) -> RepoResult<Product> {
        sqlx::query("INSERT INTO products (id, name, price, stock) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(price)
            .bind(stock)
            .execute(&self.pool)
            .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| super::RepoError::Database("product vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Restore inventory after a cancellation (reverse of the decrement)
    pub async fn restore_stock(&self, id: &str, quantity: i64) -> RepoResult<()> {
        sqlx::query("UPDATE products SET stock = stock + ? WHERE id = ?")
            .bind(quantity)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
