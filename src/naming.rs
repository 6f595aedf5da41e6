//! Naming conventions: English inflection and identifier case conversion.
//!
//! Tables are snake_case plural (`order_items`), models are StudlyCase
//! singular (`OrderItem`) and key columns are `<snake_singular>_id`.

const UNCOUNTABLE: &[&str] = &[
    "audio",
    "data",
    "deer",
    "equipment",
    "feedback",
    "fish",
    "information",
    "metadata",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "staff",
];

/// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("alias", "aliases"),
    ("analysis", "analyses"),
    ("bus", "buses"),
    ("campus", "campuses"),
    ("child", "children"),
    ("cookie", "cookies"),
    ("criterion", "criteria"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("half", "halves"),
    ("knife", "knives"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("man", "men"),
    ("mouse", "mice"),
    ("movie", "movies"),
    ("ox", "oxen"),
    ("person", "people"),
    ("shoe", "shoes"),
    ("status", "statuses"),
    ("tooth", "teeth"),
    ("virus", "viruses"),
    ("wife", "wives"),
    ("wolf", "wolves"),
    ("woman", "women"),
];

/// Carry the capitalisation of `original`'s first letter over to `word`.
fn match_case(original: &str, word: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        capitalize(word)
    } else {
        word.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Singular form of a single word.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, p)| *p == lower) {
        return match_case(word, singular);
    }
    if IRREGULAR.iter().any(|(s, _)| *s == lower) {
        return word.to_string();
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    if lower.len() > 3 && lower.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    let stem_len = if ["sses", "xes", "ches", "shes", "zzes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        word.len() - 2
    } else if lower.ends_with('s') {
        word.len() - 1
    } else {
        word.len()
    };
    word[..stem_len].to_string()
}

/// Plural form of a single word. Words that already look plural are kept.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == lower) {
        return match_case(word, plural);
    }
    if IRREGULAR.iter().any(|(_, p)| *p == lower) {
        return word.to_string();
    }
    if !is_singular(word) {
        return word.to_string();
    }
    let mut chars = lower.chars().rev();
    let last = chars.next();
    let before_last = chars.next();
    match (before_last, last) {
        (Some(b), Some('y')) if !is_vowel(b) => format!("{}ies", &word[..word.len() - 1]),
        (_, Some('s' | 'x' | 'z')) => format!("{word}es"),
        (Some('c' | 's'), Some('h')) => format!("{word}es"),
        _ => format!("{word}s"),
    }
}

pub fn is_singular(word: &str) -> bool {
    singularize(word).to_lowercase() == word.to_lowercase()
}

/// `OrderItem` / `order-item` / `Order Item` -> `order_item`
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.trim_end_matches('_').to_string()
}

/// `order_item` -> `OrderItem`; already-studly input is left alone.
pub fn studly_case(s: &str) -> String {
    s.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

/// Apply `f` to the last `_` segment of a snake_case identifier.
fn map_last_segment(snake: &str, f: impl Fn(&str) -> String) -> String {
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, f(last)),
        None => f(snake),
    }
}

/// Model name -> migration table name: `OrderItem` -> `order_items`.
pub fn table_name(model: &str) -> String {
    map_last_segment(&snake_case(model), pluralize)
}

/// Migration table name -> model name: `order_items` -> `OrderItem`.
pub fn model_name(table: &str) -> String {
    studly_case(&map_last_segment(&snake_case(table), singularize))
}

/// Singularize the last word of a snake_case name: `order_items` -> `order_item`.
pub fn singularize_snake(snake: &str) -> String {
    map_last_segment(snake, singularize)
}

/// Key column that points at `model`: `OrderItem` -> `order_item_id`.
pub fn foreign_key_column(model: &str) -> String {
    format!("{}_id", singularize_snake(&snake_case(model)))
}
