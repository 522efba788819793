use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// INFO, SUCCESS, WARNING or ERROR
    pub event: String,

    /// Acting username or SYSTEM
    pub username: String,

    #[sea_orm(column_name = "desc")]
    pub description: String,

    pub timestamp: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
