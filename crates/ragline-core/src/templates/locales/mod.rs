pub(super) mod ar;
pub(super) mod en;
