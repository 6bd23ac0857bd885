// Domain layer: models, category table and ports. No I/O here.

pub mod category;
pub mod model;
pub mod ports;
