//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod budget;
pub mod business;
pub mod enums;
pub mod expense;
pub mod invite_code;
pub mod location;
pub mod organization;
pub mod recurring_expense;
pub mod user;

// Re-export specific types to avoid conflicts
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use business::{Column as BusinessColumn, Entity as Business, Model as BusinessModel};
pub use enums::{ApprovalStatus, BudgetPeriod, Frequency, Role};
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use invite_code::{
    Column as InviteCodeColumn, Entity as InviteCode, Model as InviteCodeModel,
};
pub use location::{Column as LocationColumn, Entity as Location, Model as LocationModel};
pub use organization::{
    Column as OrganizationColumn, Entity as Organization, Model as OrganizationModel,
};
pub use recurring_expense::{
    Column as RecurringExpenseColumn, Entity as RecurringExpense, Model as RecurringExpenseModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
