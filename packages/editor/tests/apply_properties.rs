//! Property tests: apply is idempotent and apply + revert restores the page

use abkit_changes::{ChangeRecord, Position};
use abkit_editor::{Applier, EngineConfig, Owner};
use abkit_dom::Document;
use proptest::prelude::*;

const PAGE: &str = r#"<html><head></head><body>
<header id="top" class="banner dark" style="color: white; padding: 4px">
  <h1 id="title">Welcome <em>back</em></h1>
</header>
<ul id="menu">
  <li class="item" data-slot="1">Home</li>
  <li class="item active" data-slot="2">Shop</li>
  <li class="item">About</li>
</ul>
<section id="promo"><p>Deals</p><p class="fine">Terms apply</p></section>
<footer id="foot" title="Footer">Bye</footer>
</body></html>"#;

const SELECTORS: &[&str] = &[
    "#title",
    "#menu li",
    "li.active",
    "#promo p",
    "#foot",
    "header",
    ".missing",
    "#menu > li[data-slot]",
];

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::Before),
        Just(Position::After),
        Just(Position::FirstChild),
        Just(Position::LastChild),
    ]
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn record() -> impl Strategy<Value = ChangeRecord> {
    let selector = prop::sample::select(SELECTORS);
    (selector, 0usize..8, word(), word(), position(), any::<bool>()).prop_map(
        |(selector, kind, a, b, position, flag)| {
            let record = match kind {
                0 => ChangeRecord::text(selector, format!("{} {}", a, b)),
                1 => ChangeRecord::html(selector, format!("<strong>{}</strong> {}", a, b)),
                2 => ChangeRecord::style(selector, [("color", a.as_str()), ("margin", "2px")])
                    .map(|r| r.with_important(flag)),
                3 => ChangeRecord::attribute(
                    selector,
                    [
                        ("title".to_string(), if flag { Some(a.clone()) } else { None }),
                        (format!("data-{}", b), Some(a.clone())),
                    ],
                ),
                4 => ChangeRecord::class(selector, [a.clone()], ["item".to_string()]),
                5 => ChangeRecord::move_to(selector, "#foot", position),
                6 => ChangeRecord::insert(selector, format!("<span>{}</span>", a), position),
                _ => ChangeRecord::delete(selector),
            };
            record.unwrap()
        },
    )
}

fn setup() -> (Applier, Owner, Document) {
    (
        Applier::new(&EngineConfig::default()),
        Owner::new("exp", "v1").unwrap(),
        Document::parse(PAGE, "https://shop.test/").unwrap(),
    )
}

proptest! {
    #[test]
    fn apply_twice_equals_apply_once(record in record()) {
        let (mut applier, owner, mut doc) = setup();
        if applier.apply(&owner, &record, &mut doc).is_err() {
            return Ok(());
        }
        let once = doc.to_html();
        let stored = applier.store().len();

        let second = applier.apply(&owner, &record, &mut doc).unwrap();
        prop_assert_eq!(second.applied_count, 0);
        prop_assert_eq!(doc.to_html(), once);
        prop_assert_eq!(applier.store().len(), stored);
    }

    #[test]
    fn apply_then_revert_restores_page(record in record()) {
        let (mut applier, owner, mut doc) = setup();
        let before = doc.to_html();
        if applier.apply(&owner, &record, &mut doc).is_err() {
            prop_assert_eq!(doc.to_html(), before);
            return Ok(());
        }

        applier.revert(&owner, &record, &mut doc);
        prop_assert_eq!(doc.to_html(), before);
        prop_assert!(applier.store().is_empty());
        prop_assert!(!applier.markers().any_present(&doc));
    }

    #[test]
    fn stacked_records_unwind_completely(
        records in prop::collection::vec(record(), 1..5),
    ) {
        let (mut applier, owner, mut doc) = setup();
        let before = doc.to_html();
        for record in &records {
            let _ = applier.apply(&owner, record, &mut doc);
        }

        applier.revert_owner(&owner, &mut doc);
        prop_assert_eq!(doc.to_html(), before);
        prop_assert!(applier.store().is_empty());
    }
}
