use mason_collection::Representable;
use sea_orm::entity::prelude::*;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "sms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub voip_id: i32,
    pub content: String,
    pub scheduled: Option<i64>,
    pub created: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Representable for Model {
    fn brief_representation(&self) -> Option<Value> {
        Some(json!({"id": self.id, "content": self.content}))
    }
}
