//! Time-and-pay accounting engine.
//!
//! This crate classifies worked intervals into regular, overtime, night and
//! holiday minutes, prices them into gross pay, applies manual or
//! profile-based deductions, keeps per-employee leave ledgers, and gates
//! every operation behind role permissions and organization tenant scoping.
//!
//! The [`calculation`] module holds the pure calculators. The [`service`]
//! module composes them with the [`access`] resolvers and the [`store`]
//! repository ports.

#![warn(missing_docs)]

pub mod access;
pub mod api;
pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
