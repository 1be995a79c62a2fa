#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use mason_collection::{
    ApiError, CollectionConfig, CollectionDocument, CollectionRequest, Container, EntityContainer,
    FilterType, SortDirection, SortType, ValueKind,
};
use sea_orm::{ActiveValue::Set, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use sea_orm_migration::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub mod sms_entity;
use sms_entity as sms;

/// Apr 30, 2015 2:35:02 PM
pub const T: i64 = 1_430_404_502;

pub type SmsContainer = EntityContainer<sms::Entity>;

/// Ten messages of voip account 1, created one second apart from `T - 3` to `T + 6`,
/// plus one message of another account that no collection query should see
const MESSAGES: [(&str, Option<i64>); 10] = [
    ("Hello world!", None),
    ("Whatever you say", Some(T + 100)),
    ("Let's rock", None),
    ("Hello world!", None),
    ("I love pizza", Some(T + 200)),
    ("We love the president", None),
    ("ok got it, lol", None),
    ("See you tomorrow", Some(T + 300)),
    ("Call me back", Some(T + 400)),
    ("Running late", None),
];

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    let rows = MESSAGES
        .iter()
        .zip(0_i64..)
        .map(|((content, scheduled), i)| sms::ActiveModel {
            id: Set(<i32 as TryFrom<i64>>::try_from(i + 1).unwrap()),
            voip_id: Set(1),
            content: Set((*content).to_string()),
            scheduled: Set(*scheduled),
            created: Set(T - 3 + i),
        })
        .chain(std::iter::once(sms::ActiveModel {
            id: Set(11),
            voip_id: Set(2),
            content: Set("Not your message".to_string()),
            scheduled: Set(None),
            created: Set(T),
        }));
    sms::Entity::insert_many(rows).exec(&db).await?;

    Ok(db)
}

/// Container over the messages of voip account 1
pub fn sms_container(db: &DatabaseConnection) -> SmsContainer {
    EntityContainer::new(sms::Entity::find().filter(sms::Column::VoipId.eq(1)), db.clone())
}

pub fn sms_collection() -> Arc<CollectionConfig<SmsContainer>> {
    let config = CollectionConfig::<SmsContainer>::builder()
        .filter(FilterType::new("content"))
        .filter(FilterType::new("created").kind(ValueKind::Integer))
        .filter(FilterType::new("scheduled").kind(ValueKind::Integer))
        .filter(FilterType::new("id").kind(ValueKind::Integer).rules("min:1"))
        .sort(SortType::new("created"))
        .sort(SortType::new("scheduled"))
        .sort(SortType::new("content"))
        .sort(SortType::new("pogo").apply_with(|container: &mut SmsContainer, direction, _| {
            container.set_sorting("voip_id", direction)?;
            container.set_sorting("created", direction)?;
            Ok(())
        }))
        .default_sort("created", SortDirection::Desc)
        .build()
        .expect("valid collection config");
    Arc::new(config)
}

pub async fn populate(db: &DatabaseConnection, query: &str) -> Result<CollectionDocument, ApiError> {
    sms_collection()
        .populate(CollectionRequest::from_query("/sms", query), sms_container(db))
        .await
}

pub fn ids(document: &CollectionDocument) -> Vec<i64> {
    document
        .items
        .iter()
        .map(|item| item["id"].as_i64().expect("item id"))
        .collect()
}

pub fn created(document: &CollectionDocument) -> Vec<i64> {
    document
        .items
        .iter()
        .map(|item| item["created"].as_i64().expect("item created"))
        .collect()
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub sms_collection: Arc<CollectionConfig<SmsContainer>>,
}

async fn list_sms(
    State(state): State<AppState>,
    request: CollectionRequest,
) -> Result<CollectionDocument, ApiError> {
    let container = sms_container(&state.db);
    state.sms_collection.populate(request, container).await
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let state = AppState {
        db,
        sms_collection: sms_collection(),
    };

    let api = Router::new()
        .route("/sms", axum::routing::get(list_sms))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateSmsTable)]
    }
}

pub struct CreateSmsTable;

impl MigrationName for CreateSmsTable {
    fn name(&self) -> &'static str {
        "m20150430_000001_create_sms_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateSmsTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(Sms::Table)
            .if_not_exists()
            .col(ColumnDef::new(Sms::Id).integer().not_null().primary_key())
            .col(ColumnDef::new(Sms::VoipId).integer().not_null())
            .col(ColumnDef::new(Sms::Content).string().not_null())
            .col(ColumnDef::new(Sms::Scheduled).big_integer().null())
            .col(ColumnDef::new(Sms::Created).big_integer().not_null())
            .to_owned();

        manager.create_table(table).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sms::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Sms {
    Table,
    Id,
    VoipId,
    Content,
    Scheduled,
    Created,
}
