use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Name))
                    .col(string_null(Users::Surname))
                    .col(string(Users::Email).unique_key())
                    .col(string_null(Users::Phone))
                    .col(string_null(Users::Profession))
                    .col(text_null(Users::Description))
                    .col(string(Users::Password))
                    .col(string_null(Users::Avatar))
                    .to_owned(),
            )
            .await?;

        // Create courses table
        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(pk_auto(Courses::Id))
                    .col(string(Courses::Title))
                    .col(string_null(Courses::Image))
                    .col(integer_null(Courses::CountClass))
                    .to_owned(),
            )
            .await?;

        // Create courses_students table (enrollments)
        manager
            .create_table(
                Table::create()
                    .table(CoursesStudents::Table)
                    .if_not_exists()
                    .col(pk_auto(CoursesStudents::Id))
                    .col(integer(CoursesStudents::UserId))
                    .col(integer(CoursesStudents::CourseId))
                    .col(string_null(CoursesStudents::ClasesCheckeds))
                    .col(integer(CoursesStudents::State).default(1))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_courses_students_user")
                            .from(CoursesStudents::Table, CoursesStudents::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_courses_students_course")
                            .from(CoursesStudents::Table, CoursesStudents::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create sales table
        manager
            .create_table(
                Table::create()
                    .table(Sales::Table)
                    .if_not_exists()
                    .col(pk_auto(Sales::Id))
                    .col(integer(Sales::UserId))
                    .col(decimal(Sales::Total).decimal_len(10, 2))
                    .col(date_time(Sales::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_user")
                            .from(Sales::Table, Sales::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create sale_details table
        manager
            .create_table(
                Table::create()
                    .table(SaleDetails::Table)
                    .if_not_exists()
                    .col(pk_auto(SaleDetails::Id))
                    .col(integer(SaleDetails::SaleId))
                    .col(integer(SaleDetails::CourseId))
                    .col(decimal(SaleDetails::Price).decimal_len(10, 2))
                    .col(text_null(SaleDetails::Review))
                    .col(date_time(SaleDetails::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sale_details_sale")
                            .from(SaleDetails::Table, SaleDetails::SaleId)
                            .to(Sales::Table, Sales::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sale_details_course")
                            .from(SaleDetails::Table, SaleDetails::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SaleDetails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sales::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CoursesStudents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Surname,
    Email,
    Phone,
    Profession,
    Description,
    Password,
    Avatar,
}

#[derive(DeriveIden)]
enum Courses {
    Table,
    Id,
    Title,
    Image,
    CountClass,
}

#[derive(DeriveIden)]
enum CoursesStudents {
    Table,
    Id,
    UserId,
    CourseId,
    ClasesCheckeds,
    State,
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    Id,
    UserId,
    Total,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SaleDetails {
    Table,
    Id,
    SaleId,
    CourseId,
    Price,
    Review,
    CreatedAt,
}
