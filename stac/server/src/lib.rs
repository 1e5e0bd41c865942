pub mod collection;
pub mod config;
pub mod entities;
pub mod item;
pub mod links;
pub mod pagination;
pub mod search;
pub mod serializers;
pub mod session;
pub mod stac;
pub mod web;
