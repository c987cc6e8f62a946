// HTTP layer of the BP Monitor service: routes, handlers and API docs.

pub mod api;
pub mod entities;
pub mod openapi;
