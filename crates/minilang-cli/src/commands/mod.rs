pub(crate) mod demo;
pub(crate) mod helpers;
pub(crate) mod inspect;
pub(crate) mod verify;
