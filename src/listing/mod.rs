pub mod mapper;
pub mod normalize;

pub use mapper::{
    classify, map_cards, CanonicalRecord, CardError, CardKind, DishExtras, FieldSet, MapOptions,
    MapReport,
};
pub use normalize::{extract_cards, locate_cards, CardList, CardSource};
