pub(crate) mod extraction;
pub(crate) mod generation;
pub(crate) mod identity;
pub(crate) mod notifications;
pub(crate) mod scoring;
