//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use serde_json::{Value, json};

/// One card record shaped like the live API, with normal and slow audio codes.
pub fn card_json(index: usize) -> Value {
    json!({
        "id": format!("card-{index}"),
        "code": format!("L1-{index:03}"),
        "masteryLevel": 0,
        "wordType": if index % 5 == 4 { 3 } else { 2 },
        "content": {
            "simplified": format!("字{index}"),
            "traditional": "",
            "pinyin": format!("zi{index}"),
            "english1": format!("word {index}"),
            "english2": "",
            "normal": format!("a{index}"),
            "slow": format!("a{index}_s"),
        }
    })
}

/// A page body holding cards `start..end` and the reported total.
pub fn page_json(start: usize, end: usize, total: usize) -> Value {
    let cards: Vec<Value> = (start..end).map(card_json).collect();
    json!({ "flashcards": cards, "totalFlashcards": total })
}

/// A page body holding cards `start..end` with no reported total.
pub fn untotaled_page_json(start: usize, end: usize) -> Value {
    let cards: Vec<Value> = (start..end).map(card_json).collect();
    json!({ "flashcards": cards })
}
