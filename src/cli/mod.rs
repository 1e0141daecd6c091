//! Terminal front end for the fund commands

pub mod compare;
pub mod history;
pub mod search;
pub mod setup;
pub mod trends;
pub mod ui;
