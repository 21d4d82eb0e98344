//! Entities: companies and jobs keep their identity while their approval,
//! subscription and activation state change underneath.

pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;
}
