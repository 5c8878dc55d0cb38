//! This file serves as the root for all SeaORM entity modules.
//! We define the data models for the course store here: users, the
//! courses they enroll in, and the sales through which courses are
//! purchased.

pub mod course;
pub mod course_student;
pub mod sale;
pub mod sale_detail;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::course::Entity as Course;
    pub use super::course_student::Entity as CourseStudent;
    pub use super::sale::Entity as Sale;
    pub use super::sale_detail::Entity as SaleDetail;
    pub use super::user::Entity as User;
}
