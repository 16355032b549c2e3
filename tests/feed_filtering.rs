// tests/feed_filtering.rs
use std::collections::HashSet;

use longevity_lit_digest::feed::{
    build_news_message, clean_summary, filter_new_items, load_seen_items, parse_feed,
    save_seen_items,
};

const RSS_BODY: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Fight Aging!</title>
    <item>
      <title>Senolytics in the clinic</title>
      <link>https://example.org/senolytics</link>
      <pubDate>Mon, 24 Aug 2026 12:00:00 +0000</pubDate>
      <description><![CDATA[<p>A &amp; B trial results.</p>]]></description>
      <guid>https://example.org/senolytics</guid>
    </item>
    <item>
      <title>Undated item</title>
      <link>https://example.org/undated</link>
    </item>
  </channel>
</rss>"#;

const ATOM_BODY: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>t3_abc123</id>
    <title>New rapamycin thread</title>
    <link href="https://reddit.example/r/longevity/abc123"/>
    <updated>2026-08-25T09:30:00+00:00</updated>
    <content type="html">&lt;p&gt;Discussion body&lt;/p&gt;</content>
  </entry>
</feed>"#;

#[test]
fn rss_items_parse_with_dates_and_guids() {
    let items = parse_feed(RSS_BODY, "Fight Aging!").unwrap();
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].title, "Senolytics in the clinic");
    assert_eq!(items[0].url, "https://example.org/senolytics");
    assert!(items[0].published.is_some());
    assert_eq!(items[0].summary, "A & B trial results.");
    assert_eq!(items[0].guid.len(), 64);

    assert!(items[1].published.is_none());
}

#[test]
fn atom_fallback_covers_reddit_feeds() {
    let items = parse_feed(ATOM_BODY, "r/longevity").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "New rapamycin thread");
    assert_eq!(items[0].url, "https://reddit.example/r/longevity/abc123");
    assert!(items[0].published.is_some());
    assert_eq!(items[0].summary, "Discussion body");
}

#[test]
fn filtering_drops_seen_and_stale_but_keeps_undated() {
    let now = parse_feed(RSS_BODY, "x").unwrap()[0].published.unwrap() + 3600;
    let items = parse_feed(RSS_BODY, "x").unwrap();
    let seen: HashSet<String> = HashSet::new();

    // Both survive a 24h window an hour after publication.
    let fresh = filter_new_items(items.clone(), &seen, now, 24);
    assert_eq!(fresh.len(), 2);

    // The dated item ages out; the undated one is kept.
    let later = filter_new_items(items.clone(), &seen, now + 48 * 3600, 24);
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].title, "Undated item");

    // Seen guids are dropped wherever they came from.
    let seen: HashSet<String> = items.iter().map(|i| i.guid.clone()).collect();
    assert!(filter_new_items(items, &seen, now, 24).is_empty());
}

#[test]
fn seen_state_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");

    assert!(load_seen_items(&path).is_empty());

    let guids: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
    save_seen_items(&path, &guids).unwrap();
    assert_eq!(load_seen_items(&path), guids);

    // Corrupt state reads as empty rather than failing the run.
    std::fs::write(&path, "{not json").unwrap();
    assert!(load_seen_items(&path).is_empty());
}

#[test]
fn clean_summary_strips_markup_and_truncates() {
    assert_eq!(
        clean_summary("<p>Hello &amp;\n  <b>world</b></p>"),
        "Hello & world"
    );
    let long = "word ".repeat(200);
    let cleaned = clean_summary(&long);
    assert!(cleaned.chars().count() <= 500);
    assert!(cleaned.ends_with("..."));
}

#[test]
fn news_message_groups_by_source() {
    let mut items = parse_feed(RSS_BODY, "Fight Aging!").unwrap();
    items.extend(parse_feed(ATOM_BODY, "r/longevity").unwrap());
    let now = items[0].published.unwrap() + 3600;

    let message = build_news_message(&items, now);
    let text = message.to_string();
    assert!(text.contains("Longevity News Roundup"));
    assert!(text.contains("Fight Aging!"));
    assert!(text.contains("r/longevity"));
    assert!(text.contains("3 new items"));
}
