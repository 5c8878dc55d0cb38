use sea_orm::entity::prelude::*;

/// Enrollment state marking a terminated (fully completed) course.
pub const STATE_TERMINATED: i32 = 2;

/// A student's enrollment in one course.
///
/// Progress is tracked as a comma-separated list of checked class ids.
/// An enrollment with at least one checked class counts as active; an
/// enrollment with `state == STATE_TERMINATED` counts as terminated.
/// The two are independent.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courses_students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub course_id: i32,
    /// Comma-separated ids of the classes the student marked complete.
    pub clases_checkeds: Option<String>,
    pub state: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
