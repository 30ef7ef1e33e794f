// Domain layer - Operation state and outcomes

pub mod model;
