//! charity-hub - GraphQL backend for a charity association
//!
//! Campaigns and donations, volunteering initiatives, conferences, events,
//! a merchandise store, editorial and community content, and chat rooms,
//! served over GraphQL with MongoDB storage and Stripe payments.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod graphql;
pub mod models;
pub mod services;
