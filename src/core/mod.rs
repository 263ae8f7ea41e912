//! Framework-agnostic business logic.
//!
//! Every operation takes an explicit database handle and, where the caller matters, an
//! authenticated [`session::Actor`]. All queries are scoped to the actor's organization.

pub mod analytics;
pub mod budget;
pub mod business;
pub mod expense;
pub mod forecast;
pub mod invite;
pub mod onboarding;
pub mod organization;
pub mod recurring;
pub mod role;
pub mod schedule;
pub mod session;
pub mod unit_of_work;
pub mod user;
