use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

// token_id is not a foreign key: attempts with unknown ids are logged too.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub request_time: DateTimeUtc,
    #[sea_orm(indexed)]
    pub token_id: String,
    pub token_valid: bool,
    pub client_ip: String,
    #[sea_orm(column_type = "Text")]
    pub request_data: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
