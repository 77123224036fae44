//! Locates the dish-card array inside a search API response.

use serde_json::Value;

/// Pointer from a top-level card group to its dish collection.
const DISH_CARDS_POINTER: &str = "/groupedCard/cardGroupMap/DISH/cards";
/// Index of the group that usually carries dishes.
const PRIMARY_GROUP: usize = 1;

/// Where the card array was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSource {
    Primary,
    /// Found by scanning; holds the index of the top-level group.
    Fallback(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct CardList<'a> {
    pub source: CardSource,
    pub cards: &'a [Value],
}

fn dish_cards(group: &Value) -> Option<&[Value]> {
    group
        .pointer(DISH_CARDS_POINTER)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// Two-tier lookup: `data.cards[1]` first, then the first group in
/// `data.cards` exposing the same shape.
pub fn locate_cards(response: &Value) -> Option<CardList<'_>> {
    let groups = response.pointer("/data/cards")?.as_array()?;

    if let Some(cards) = groups.get(PRIMARY_GROUP).and_then(dish_cards) {
        return Some(CardList {
            source: CardSource::Primary,
            cards,
        });
    }

    groups.iter().enumerate().find_map(|(idx, group)| {
        dish_cards(group).map(|cards| CardList {
            source: CardSource::Fallback(idx),
            cards,
        })
    })
}

/// Raw cards of a response; empty when nothing matches. Never fails.
pub fn extract_cards(response: &Value) -> &[Value] {
    locate_cards(response)
        .map(|list| list.cards)
        .unwrap_or_default()
}
