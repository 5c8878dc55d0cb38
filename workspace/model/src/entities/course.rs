use sea_orm::entity::prelude::*;

/// A course offered in the store.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    /// Relative path of the cover image inside blob storage.
    pub image: Option<String>,
    /// Expected total number of classes. Progress is reported as 0 when
    /// this is absent or zero.
    pub count_class: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course_student::Entity")]
    CourseStudent,
    #[sea_orm(has_many = "super::sale_detail::Entity")]
    SaleDetail,
}

impl Related<super::course_student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseStudent.def()
    }
}

impl Related<super::sale_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleDetail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
