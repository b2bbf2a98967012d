use scraper::Html;
use scrapedeck_core::{parse_sites, SourceConfig};

use super::*;

fn compile(fields: &str, options: &str) -> CompiledSite {
    let yaml = format!(
        "sites:\n  - id: demo\n    name: Demo\n    parameters:\n      - {{ name: search_term, type: text, label: Term, required: true }}\n    source:\n      engine: listing\n      domain: \"https://shop.example.com\"\n      search_url: \"https://shop.example.com/s?q={{term}}\"\n      containers: [{{ css: \".item\" }}]\n{options}      fields:\n{fields}"
    );
    let file = parse_sites(&yaml).expect("test yaml should validate");
    let site = file.sites.into_iter().next().unwrap();
    let SourceConfig::Listing(listing) = &site.source else {
        panic!("expected listing engine");
    };
    CompiledSite::compile(&site.id, &site.name, listing).expect("rules should compile")
}

fn first_record(html: &str, site: &CompiledSite) -> ListingRecord {
    let document = Html::parse_document(html);
    let element = document
        .select(&site.containers[0].selector)
        .next()
        .expect("fixture should contain a container");
    extract(element, site)
}

const MARKETPLACE_FIELDS: &str = r#"        name:
          locate:
            - { css: "h2 a span" }
            - { css: "h2 span" }
        url:
          locate:
            - { css: "h2 a[href]", attr: href, transform: url }
        price:
          locate:
            - { css: ".price-whole", contains_any: ["₹"], numeric_ok: true }
            - { css: ".price .offscreen", contains_any: ["₹"], numeric_ok: true }
        original_price:
          locate:
            - { css: ".strike .offscreen", contains_all: ["₹"] }
        discount_percentage:
          locate:
            - { text: full, pattern: '\((\d+)%\s*off\)', template: "$1% off" }
        rating:
          locate:
            - { css: ".stars", pattern: '(\d+\.?\d*)\s*out\s*of\s*5' }
        is_sponsored:
          kind: flag
          any_of:
            - { text_contains: "Sponsored" }
            - { markup_contains: 'data-component-type="sponsored"' }
        is_prime:
          kind: flag
          any_of:
            - { css: ".icon-prime" }
"#;

#[test]
fn extracts_core_and_extra_fields() {
    let site = compile(MARKETPLACE_FIELDS, "");
    let record = first_record(
        r#"<div class="item">
             <h2><a href="/dp/B0X1"><span>Samsung Galaxy M14 5G</span></a></h2>
             <span class="price-whole">13,999</span>
             <span class="strike"><span class="offscreen">₹17,999</span></span>
             <span>(22% off)</span>
             <i class="stars">4.1 out of 5 stars</i>
             <span>Sponsored</span>
           </div>"#,
        &site,
    );

    assert_eq!(record.name, "Samsung Galaxy M14 5G");
    assert_eq!(record.url, "https://shop.example.com/dp/B0X1");
    assert_eq!(record.price_text, "13,999");
    assert!((record.price_numeric - 13_999.0).abs() < f64::EPSILON);
    assert!((record.original_price_numeric - 17_999.0).abs() < f64::EPSILON);
    assert!((record.savings_amount - 4_000.0).abs() < f64::EPSILON);
    assert_eq!(record.text("discount_percentage"), Some("22% off"));
    assert_eq!(record.text("rating"), Some("4.1"));
    assert_eq!(record.brand, "Samsung");
    assert!(record.is_sponsored);
    assert_eq!(record.extra.get("is_prime"), Some(&FieldValue::Flag(false)));
    assert!(record.is_valid());
}

#[test]
fn falls_through_to_second_locator() {
    let site = compile(MARKETPLACE_FIELDS, "");
    let record = first_record(
        r#"<div class="item">
             <h2><span>Plain Title</span></h2>
             <span class="price"><span class="offscreen">₹499</span></span>
           </div>"#,
        &site,
    );
    assert_eq!(record.name, "Plain Title");
    assert_eq!(record.price_text, "₹499");
    assert!((record.price_numeric - 499.0).abs() < f64::EPSILON);
}

#[test]
fn price_filter_rejects_text_without_currency() {
    let site = compile(MARKETPLACE_FIELDS, "");
    let record = first_record(
        r#"<div class="item">
             <h2><span>Gadget</span></h2>
             <span class="price-whole">Currently unavailable</span>
           </div>"#,
        &site,
    );
    assert!(record.price_text.is_empty());
    assert!(record.price_numeric.abs() < f64::EPSILON);
    assert!(!record.is_valid());
}

#[test]
fn markup_indicator_and_missing_fields_use_zero_values() {
    let site = compile(MARKETPLACE_FIELDS, "");
    let record = first_record(
        r#"<div class="item" data-component-type="sponsored"><h2><span>Thing</span></h2></div>"#,
        &site,
    );
    assert!(record.is_sponsored);
    assert_eq!(record.text("rating"), Some(""));
    assert_eq!(record.text("discount_percentage"), Some(""));
    assert!(record.savings_amount.abs() < f64::EPSILON);
}

#[test]
fn sponsored_text_indicator_is_case_sensitive() {
    let site = compile(MARKETPLACE_FIELDS, "");
    let record = first_record(
        r#"<div class="item"><h2><span>Not sponsored by anyone: Desk Lamp</span></h2></div>"#,
        &site,
    );
    assert!(!record.is_sponsored);

    let record = first_record(
        r#"<div class="item"><h2><span>Desk Lamp</span></h2><span>Sponsored</span></div>"#,
        &site,
    );
    assert!(record.is_sponsored);
}

#[test]
fn tries_every_match_of_a_locator_before_the_next() {
    let site = compile(
        "        name:\n          locate:\n            - { css: \".t\", contains_all: [\"shoe\"] }\n",
        "",
    );
    let record = first_record(
        r#"<div class="item"><p class="t">Bestseller</p><p class="t">Running Shoe</p></div>"#,
        &site,
    );
    assert_eq!(record.name, "Running Shoe");
}

#[test]
fn numeric_override_wins_over_price_text() {
    let fields = r#"        name:
          locate: [{ css: ".title" }]
        price:
          locate: [{ css: ".product-price" }]
        price_numeric:
          kind: number
          locate: [{ css: ".product-price", attr: data-price }]
"#;
    let site = compile(fields, "");
    let record = first_record(
        r#"<div class="item"><p class="title">Chinos</p><span class="product-price" data-price="449">Rs. 499</span></div>"#,
        &site,
    );
    assert_eq!(record.price_text, "Rs. 499");
    assert!((record.price_numeric - 449.0).abs() < f64::EPSILON);
}

#[test]
fn width_rating_and_lists() {
    let fields = r#"        name:
          locate: [{ css: ".title", text: longer_title }]
        rating:
          locate:
            - { css: ".filled-stars", attr: style, pattern: 'width:\s*([^;]+)', transform: width_rating }
        colors_available:
          kind: list
          locate:
            - { css: ".color-attr", attr: style, pattern: 'background:\s*([^;]+)', reject: ["none"] }
        sizes_available:
          kind: list
          locate:
            - { css: ".size", skip_class: hidden, pattern: '^(\d+)$' }
"#;
    let site = compile(fields, "      brand_inference: up_to_hyphen\n");
    let record = first_record(
        r#"<div class="item">
             <p class="title" title="Urbano Slim Fit Jeans - Blue">Urbano Slim...</p>
             <div class="filled-stars" style="width:84%"></div>
             <span class="color-attr" style="background:#000;"></span>
             <span class="color-attr" style="background:none;"></span>
             <span class="color-attr" style="background:#000;"></span>
             <span class="color-attr" style="background:#fff"></span>
             <span class="size">30</span>
             <span class="size hidden">32</span>
             <span class="size">34</span>
             <span class="size">XL</span>
           </div>"#,
        &site,
    );
    assert_eq!(record.name, "Urbano Slim Fit Jeans - Blue");
    assert_eq!(record.brand, "Urbano Slim Fit Jeans");
    assert_eq!(record.text("rating"), Some("4.2"));
    assert_eq!(
        record.extra.get("colors_available"),
        Some(&FieldValue::List(vec!["#000".to_owned(), "#fff".to_owned()]))
    );
    assert_eq!(
        record.extra.get("sizes_available"),
        Some(&FieldValue::List(vec!["30".to_owned(), "34".to_owned()]))
    );
}

#[test]
fn default_holds_until_a_locator_resolves() {
    let fields = r#"        name:
          locate: [{ css: ".title" }]
        food_type:
          default: veg
          locate:
            - { css: ".foodtype img", attr: src, pattern: '(non-veg|veg)' }
        fulfilled:
          kind: flag
          any_of:
            - { css: ".badge", text_contains: "Fulfilled By Shop" }
"#;
    let site = compile(fields, "      price_format: decimal\n      brand_inference: none\n");

    let plain = first_record(
        r#"<div class="item"><p class="title">Basmati Rice 5 kg</p><span class="badge">Popular</span></div>"#,
        &site,
    );
    assert_eq!(plain.text("food_type"), Some("veg"));
    assert_eq!(plain.extra.get("fulfilled"), Some(&FieldValue::Flag(false)));
    assert!(plain.brand.is_empty());

    let meat = first_record(
        r#"<div class="item"><p class="title">Chicken</p>
             <div class="foodtype"><img src="/icons/non-veg.svg"></div>
             <span class="badge">Fulfilled By Shop</span></div>"#,
        &site,
    );
    assert_eq!(meat.text("food_type"), Some("non-veg"));
    assert_eq!(meat.extra.get("fulfilled"), Some(&FieldValue::Flag(true)));
}

#[test]
fn located_brand_is_not_overwritten() {
    let fields = r#"        name:
          locate: [{ css: ".title" }]
        brand:
          locate: [{ css: ".brand" }]
"#;
    let site = compile(fields, "");
    let record = first_record(
        r#"<div class="item"><h3 class="brand">Levis</h3><p class="title">Men Regular Jeans</p></div>"#,
        &site,
    );
    assert_eq!(record.brand, "Levis");
}

#[test]
fn unparsable_number_keeps_zero() {
    let fields = r#"        name:
          locate: [{ css: ".title" }]
        review_count:
          kind: number
          locate: [{ css: ".reviews" }]
"#;
    let site = compile(fields, "      price_format: decimal\n");
    let record = first_record(
        r#"<div class="item"><p class="title">Lamp</p><span class="reviews">1.2.3</span></div>"#,
        &site,
    );
    assert_eq!(record.extra.get("review_count"), Some(&FieldValue::Number(0.0)));
}

#[test]
fn title_over_text_prefers_title_attribute() {
    let fields = "        name:\n          locate: [{ css: \"a\", text: title_over_text }]\n";
    let site = compile(fields, "");
    let record = first_record(
        r#"<div class="item"><a title="Full Product Name">Full Prod…</a></div>"#,
        &site,
    );
    assert_eq!(record.name, "Full Product Name");
}
