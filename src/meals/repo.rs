use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use time::Date;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::meals::model::Meal;
use crate::meals::repo_types::{encode_timestamp, FoodRow, MealRow};

/// Optional inclusive calendar-day bounds plus a result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealQuery {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub limit: i64,
}

/// Durable storage of meal headers and their food lines.
#[derive(Clone)]
pub struct MealStore {
    db: SqlitePool,
}

impl MealStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Inserts the header and every food row in one transaction. No upsert:
    /// an existing id fails the whole write.
    #[instrument(skip(self, meal), fields(meal_id = %meal.id, foods = meal.foods.len()))]
    pub async fn save_meal(&self, meal: &Meal) -> PipelineResult<()> {
        let id = meal.id.to_string();
        let timestamp = encode_timestamp(meal.timestamp)?;
        let created_at = encode_timestamp(meal.created_at)?;
        let updated_at = encode_timestamp(meal.updated_at)?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO meals (id, description, timestamp, total_carbs, confidence,
                               created_at, updated_at, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&meal.description)
        .bind(&timestamp)
        .bind(meal.total_carbs)
        .bind(meal.confidence.as_str())
        .bind(&created_at)
        .bind(&updated_at)
        .bind(meal.source.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return PipelineError::Persistence(format!("meal {id} already exists"));
                }
            }
            PipelineError::from(e)
        })?;

        for food in &meal.foods {
            sqlx::query(
                r#"
                INSERT INTO foods (meal_id, name, quantity, carbs_per_100g, estimated_carbs, confidence)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&food.name)
            .bind(&food.quantity)
            .bind(food.carbs_per_100g)
            .bind(food.estimated_carbs)
            .bind(food.confidence.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("meal saved");
        Ok(())
    }

    /// Newest first by occurrence time, foods in insertion order. Headers and
    /// food lines come from one read transaction.
    #[instrument(skip(self))]
    pub async fn get_meals(&self, query: MealQuery) -> PipelineResult<Vec<Meal>> {
        let mut tx = self.db.begin().await?;
        let rows = select_headers(&mut tx, query).await?;
        let meals = attach_foods(&mut tx, rows).await?;
        tx.commit().await?;

        debug!(count = meals.len(), "meals loaded");
        Ok(meals)
    }

    pub async fn get_meal(&self, id: Uuid) -> PipelineResult<Option<Meal>> {
        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, MealRow>(
            r#"
            SELECT id, description, timestamp, total_carbs, confidence, created_at, updated_at, source
            FROM meals
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let meal = attach_foods(&mut tx, row.into_iter().collect()).await?.pop();
        tx.commit().await?;
        Ok(meal)
    }

    /// Removes a meal; its foods go with it via the cascade.
    #[instrument(skip(self))]
    pub async fn delete_meal(&self, id: Uuid) -> PipelineResult<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

async fn select_headers(
    conn: &mut SqliteConnection,
    query: MealQuery,
) -> PipelineResult<Vec<MealRow>> {
    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT id, description, timestamp, total_carbs, confidence, created_at, updated_at, source \
         FROM meals WHERE 1 = 1",
    );
    if let Some(start) = query.start_date {
        qb.push(" AND date(timestamp) >= ").push_bind(start.to_string());
    }
    if let Some(end) = query.end_date {
        qb.push(" AND date(timestamp) <= ").push_bind(end.to_string());
    }
    qb.push(" ORDER BY timestamp DESC, created_at DESC LIMIT ")
        .push_bind(query.limit);

    let rows: Vec<MealRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
    Ok(rows)
}

async fn attach_foods(conn: &mut SqliteConnection, rows: Vec<MealRow>) -> PipelineResult<Vec<Meal>> {
    let mut meals = Vec::with_capacity(rows.len());
    for row in rows {
        let foods = load_foods(conn, &row.id).await?;
        meals.push(row.into_meal(foods)?);
    }
    Ok(meals)
}

async fn load_foods(conn: &mut SqliteConnection, meal_id: &str) -> PipelineResult<Vec<FoodRow>> {
    let rows = sqlx::query_as::<_, FoodRow>(
        r#"
        SELECT name, quantity, carbs_per_100g, estimated_carbs, confidence
          FROM foods
         WHERE meal_id = ?
         ORDER BY id
        "#,
    )
    .bind(meal_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
