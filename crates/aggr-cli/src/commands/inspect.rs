use aggr_state::Tier;

use super::open_store;

pub fn keys(config: &str, tier: Tier, table: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut keys: Vec<String> = store.connection(tier).list_keys(table)?.into_iter().collect();
    keys.sort();
    for key in &keys {
        println!("{key}");
    }
    eprintln!("{} key(s) in {tier}/{table}", keys.len());
    Ok(())
}

pub fn get(config: &str, tier: Tier, table: &str, key: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let raw = store.connection(tier).read_raw(table, key)?;
    println!("{}", render(&raw));
    Ok(())
}

pub fn search(config: &str, index: &str, needle: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    for key in store.get_string(index, needle)? {
        println!("{key}");
    }
    Ok(())
}

/// Pretty JSON when the record parses, otherwise the bytes as text.
/// Documents saved verbatim are stored as a JSON string and are unwrapped.
fn render(raw: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(body)) => match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(doc) => serde_json::to_string_pretty(&doc).unwrap_or(body),
            Err(_) => body,
        },
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_unwraps_verbatim_documents() {
        let raw = serde_json::to_vec(r#"{"Id":"m1"}"#).unwrap();
        assert_eq!(render(&raw), "{\n  \"Id\": \"m1\"\n}");
    }

    #[test]
    fn render_falls_back_to_text() {
        assert_eq!(render(b"not json"), "not json");
        assert_eq!(render(br#""plain""#), "plain");
    }
}
