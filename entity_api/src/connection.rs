//! Persistence for the `connections` table, the relay's durable registry.
//!
//! Every write here is a single statement so it is atomic per connection id.
//! Nothing in this module spans more than one row transactionally; the class
//! index is only as consistent as the database's own secondary index.
use super::error::Error;
use chrono::{DateTime, Duration, Utc};
use entity::connection_class::ConnectionClass;
use entity::connections::{ActiveModel, Column, Entity, Model};
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    DatabaseConnection, QueryOrder, QuerySelect,
};

/// Inserts the connection or, when a row with the same id exists, overwrites its
/// class and expiry. `registered_at` keeps the value from the first insert.
pub async fn upsert(
    db: &DatabaseConnection,
    id: &str,
    class: ConnectionClass,
    ttl: Option<Duration>,
) -> Result<Model, Error> {
    debug!("Upserting connection {id} as {class}");

    let now = Utc::now();

    let active_model = ActiveModel {
        id: Set(id.to_string()),
        class: Set(class),
        registered_at: Set(now.into()),
        expires_at: Set(ttl.map(|ttl| (now + ttl).into())),
    };

    Ok(Entity::insert(active_model)
        .on_conflict(
            OnConflict::column(Column::Id)
                .update_columns([Column::Class, Column::ExpiresAt])
                .to_owned(),
        )
        .exec_with_returning(db)
        .await?)
}

/// Pushes the connection's expiry out to `ttl` from now. Returns whether a row
/// with this id exists; the class and `registered_at` are left untouched.
pub async fn refresh_expiry(
    db: &DatabaseConnection,
    id: &str,
    ttl: Duration,
) -> Result<bool, Error> {
    let expires_at: DateTimeWithTimeZone = (Utc::now() + ttl).into();

    let result = Entity::update_many()
        .col_expr(Column::ExpiresAt, Expr::value(Some(expires_at)))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    trace!("Refreshed expiry of connection {id}");

    Ok(result.rows_affected > 0)
}

/// Removes the connection. Deleting an id that is not present is not an error.
pub async fn delete_by_id(db: &DatabaseConnection, id: &str) -> Result<(), Error> {
    let result = Entity::delete_by_id(id.to_string()).exec(db).await?;

    debug!(
        "Deleted connection {id} ({} row(s) affected)",
        result.rows_affected
    );

    Ok(())
}

pub async fn find_by_id(db: &DatabaseConnection, id: &str) -> Result<Option<Model>, Error> {
    Ok(Entity::find_by_id(id.to_string()).one(db).await?)
}

/// Returns every connection currently holding `class`.
///
/// Rows are read in pages of `page_size` using the primary key as a cursor, and
/// all pages are concatenated before returning. Rows inserted or deleted while
/// the pages are being read may or may not be observed.
pub async fn find_by_class(
    db: &DatabaseConnection,
    class: ConnectionClass,
    page_size: u64,
) -> Result<Vec<Model>, Error> {
    let page_size = page_size.max(1);
    let mut models: Vec<Model> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut query = Entity::find()
            .filter(Column::Class.eq(class))
            .order_by_asc(Column::Id)
            .limit(page_size);

        if let Some(last_id) = cursor.take() {
            query = query.filter(Column::Id.gt(last_id));
        }

        let page = query.all(db).await?;
        let fetched = page.len() as u64;
        cursor = page.last().map(|model| model.id.clone());
        models.extend(page);

        if fetched < page_size {
            break;
        }
    }

    trace!("Found {} {class} connection(s)", models.len());

    Ok(models)
}

/// Deletes every connection whose `expires_at` lies before `now`, returning the
/// number of rows removed.
pub async fn delete_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, Error> {
    let result = Entity::delete_many()
        .filter(Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
