//! Property Repository

use shared::models::{Property, PropertyFilter, PropertyInput, PropertyStatus};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, title, description, property_type, listing_type, price, address, city, state, zip_code, country, bedrooms, bathrooms, area_sqft, year_built, status, featured, agent_id, created_at, updated_at";

const DEFAULT_COUNTRY: &str = "USA";

/// Filtered listing, featured first then newest
pub async fn find_all(pool: &SqlitePool, filter: &PropertyFilter) -> RepoResult<Vec<Property>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM properties WHERE 1=1"));

    if let Some(city) = filter.city.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND city LIKE ").push_bind(format!("%{city}%"));
    }
    if let Some(property_type) = filter.property_type.as_deref().filter(|t| !t.is_empty()) {
        qb.push(" AND property_type = ").push_bind(property_type.to_string());
    }
    if let Some(listing_type) = filter.listing_type.as_deref().filter(|t| !t.is_empty()) {
        qb.push(" AND listing_type = ").push_bind(listing_type.to_string());
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(bedrooms) = filter.bedrooms {
        qb.push(" AND bedrooms >= ").push_bind(bedrooms);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if filter.featured {
        qb.push(" AND featured = 1 AND status = ")
            .push_bind(PropertyStatus::Available.as_str());
    }
    qb.push(" ORDER BY featured DESC, created_at DESC, id DESC");

    let rows = qb.build_query_as::<Property>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Property>> {
    let row = sqlx::query_as::<_, Property>(&format!("SELECT {COLUMNS} FROM properties WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Owning agent of a property, `None` when the property does not exist
pub async fn find_owner(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<i64>> {
    let owner = sqlx::query_scalar::<_, i64>("SELECT agent_id FROM properties WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(owner)
}

/// Insert a new listing (always `available`). Returns the new id.
pub async fn create(
    conn: &mut SqliteConnection,
    input: &PropertyInput,
    agent_id: i64,
) -> RepoResult<i64> {
    let now = shared::util::now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO properties (title, description, property_type, listing_type, price, address, city, state, zip_code, country, bedrooms, bathrooms, area_sqft, year_built, status, featured, agent_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18) RETURNING id",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.property_type)
    .bind(&input.listing_type)
    .bind(input.price)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.zip_code)
    .bind(input.country.as_deref().unwrap_or(DEFAULT_COUNTRY))
    .bind(input.bedrooms.unwrap_or(0))
    .bind(input.bathrooms.unwrap_or(0.0))
    .bind(input.area_sqft)
    .bind(input.year_built)
    .bind(PropertyStatus::Available.as_str())
    .bind(input.featured)
    .bind(agent_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Overwrite the scalar fields of a listing. A missing status keeps the current one.
pub async fn update(conn: &mut SqliteConnection, id: i64, input: &PropertyInput) -> RepoResult<()> {
    let now = shared::util::now_millis();
    let result = sqlx::query(
        "UPDATE properties SET title = ?1, description = ?2, property_type = ?3, listing_type = ?4, price = ?5, \
         address = ?6, city = ?7, state = ?8, zip_code = ?9, country = ?10, bedrooms = ?11, bathrooms = ?12, \
         area_sqft = ?13, year_built = ?14, status = COALESCE(?15, status), featured = ?16, updated_at = ?17 \
         WHERE id = ?18",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.property_type)
    .bind(&input.listing_type)
    .bind(input.price)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.zip_code)
    .bind(input.country.as_deref().unwrap_or(DEFAULT_COUNTRY))
    .bind(input.bedrooms.unwrap_or(0))
    .bind(input.bathrooms.unwrap_or(0.0))
    .bind(input.area_sqft)
    .bind(input.year_built)
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.featured)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Property {id} not found")));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM properties WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    fn input(title: &str, city: &str, price: f64) -> PropertyInput {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "property_type": "house",
            "listing_type": "sale",
            "price": price,
            "city": city,
            "bedrooms": 3
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults_and_find() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let id = create(&mut conn, &input("Cottage", "Portland", 250_000.0), 7)
            .await
            .unwrap();
        drop(conn);

        let property = find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert_eq!(property.title, "Cottage");
        assert_eq!(property.country, "USA");
        assert_eq!(property.status, PropertyStatus::Available);
        assert_eq!(property.agent_id, 7);
        assert_eq!(property.created_at, property.updated_at);
    }

    #[tokio::test]
    async fn test_filter_city_substring_and_price() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        create(&mut conn, &input("A", "Portland", 100.0), 1).await.unwrap();
        create(&mut conn, &input("B", "South Portland", 300.0), 1).await.unwrap();
        create(&mut conn, &input("C", "Seattle", 200.0), 1).await.unwrap();
        drop(conn);

        let filter = PropertyFilter {
            city: Some("portland".into()),
            min_price: Some(150.0),
            ..Default::default()
        };
        let rows = find_all(&db.pool, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "B");
    }

    #[tokio::test]
    async fn test_featured_only_available() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let mut featured = input("Featured", "X", 1.0);
        featured.featured = true;
        let sold_id = create(&mut conn, &featured, 1).await.unwrap();
        create(&mut conn, &featured, 1).await.unwrap();
        create(&mut conn, &input("Plain", "X", 1.0), 1).await.unwrap();

        let mut sold = featured.clone();
        sold.status = Some(PropertyStatus::Sold);
        update(&mut conn, sold_id, &sold).await.unwrap();
        drop(conn);

        let filter = PropertyFilter {
            featured: true,
            ..Default::default()
        };
        let rows = find_all(&db.pool, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].featured);
        assert_eq!(rows[0].status, PropertyStatus::Available);
    }

    #[tokio::test]
    async fn test_update_keeps_status_when_absent() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let mut data = input("Flat", "Y", 10.0);
        let id = create(&mut conn, &data, 1).await.unwrap();

        data.status = Some(PropertyStatus::Pending);
        update(&mut conn, id, &data).await.unwrap();
        data.status = None;
        data.title = "Flat 2".into();
        update(&mut conn, id, &data).await.unwrap();
        drop(conn);

        let property = find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert_eq!(property.title, "Flat 2");
        assert_eq!(property.status, PropertyStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let db = DbService::in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let err = update(&mut conn, 42, &input("Z", "Z", 1.0)).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        assert!(!delete(&mut conn, 42).await.unwrap());
    }
}
