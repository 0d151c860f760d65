mod common;

use axum::http::StatusCode;
use common::{bearer, header, spawn_app, TestApp};
use easyppp_core::store::ProductRepository;
use easyppp_core::{NewProduct, ProductCustomization, TierName, UserId};
use serde_json::{json, Value};

const SITE: &str = "https://course.example.com";

/// Product owned by `user` with a 60% coupon for Group 7
async fn discounted_product(app: &TestApp, user: &str) -> String {
    let (name, value) = bearer(user);
    let created: Value = app
        .server
        .post("/api/products")
        .add_header(name, value)
        .json(&json!({ "name": "Rust for Everyone", "url": SITE }))
        .await
        .json();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    set_group_7_discount(app, user, &id, 60, "PPP60").await;
    id
}

async fn set_group_7_discount(app: &TestApp, user: &str, id: &str, percent: u32, coupon: &str) {
    let (name, value) = bearer(user);
    let groups: Value = app
        .server
        .get(&format!("/api/products/{id}/country-discounts"))
        .add_header(name.clone(), value.clone())
        .await
        .json();
    let group_id = groups["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["name"] == "Group 7")
        .map(|g| g["id"].as_str().unwrap().to_string())
        .unwrap();

    let response = app
        .server
        .put(&format!("/api/products/{id}/country-discounts"))
        .add_header(name, value)
        .json(&json!({
            "groups": [{
                "country_group_id": group_id,
                "discount_percentage": percent,
                "coupon": coupon
            }]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

async fn banner_for_india(app: &TestApp, id: &str) -> axum_test::TestResponse {
    let (referer_name, referer) = header("referer", SITE);
    let (country_name, country) = header("x-vercel-ip-country", "IN");
    app.server
        .get(&format!("/api/products/{id}/banner"))
        .add_header(referer_name, referer)
        .add_header(country_name, country)
        .await
}

#[tokio::test]
async fn test_banner_script_for_discounted_country() {
    let app = spawn_app().await;
    app.subscribe("user_1", TierName::Free).await;
    let id = discounted_product(&app, "user_1").await;

    let (referer_name, referer) = header("referer", "https://course.example.com/");
    let (country_name, country) = header("x-vercel-ip-country", "IN");
    let response = app
        .server
        .get(&format!("/api/products/{id}/banner"))
        .add_header(referer_name, referer)
        .add_header(country_name, country)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "text/javascript");
    let script = response.text();
    assert!(script.contains("PPP60"));
    assert!(script.contains("India"));
    assert!(script.contains("easy-ppp-container"));
    assert!(script.contains("Powered by Easy PPP"));
    assert!(script.contains("document.querySelector(\"body\")"));
}

#[tokio::test]
async fn test_banner_not_found_cases() {
    let app = spawn_app().await;
    app.subscribe("user_1", TierName::Free).await;
    let id = discounted_product(&app, "user_1").await;
    let path = format!("/api/products/{id}/banner");

    let (country_name, country) = header("x-vercel-ip-country", "IN");
    let no_referer = app
        .server
        .get(&path)
        .add_header(country_name.clone(), country.clone())
        .await;
    assert_eq!(no_referer.status_code(), StatusCode::NOT_FOUND);

    let (referer_name, referer) = header("referer", SITE);
    let no_country = app
        .server
        .get(&path)
        .add_header(referer_name.clone(), referer.clone())
        .await;
    assert_eq!(no_country.status_code(), StatusCode::NOT_FOUND);

    let (other_name, other_site) = header("referer", "https://elsewhere.example.com");
    let wrong_site = app
        .server
        .get(&path)
        .add_header(other_name, other_site)
        .add_header(country_name, country)
        .await;
    assert_eq!(wrong_site.status_code(), StatusCode::NOT_FOUND);

    // Group 1 has no recommended discount and no coupon
    let (us_name, us) = header("x-vercel-ip-country", "US");
    let no_discount = app
        .server
        .get(&path)
        .add_header(referer_name, referer)
        .add_header(us_name, us)
        .await;
    assert_eq!(no_discount.status_code(), StatusCode::NOT_FOUND);
    assert!(no_discount.text().is_empty());
}

#[tokio::test]
async fn test_banner_views_show_in_analytics() {
    let app = spawn_app().await;
    app.subscribe("user_1", TierName::Basic).await;
    let id = discounted_product(&app, "user_1").await;

    for code in ["IN", "IN", "US"] {
        let (referer_name, referer) = header("referer", SITE);
        let (country_name, country) = header("x-vercel-ip-country", code);
        app.server
            .get(&format!("/api/products/{id}/banner"))
            .add_header(referer_name, referer)
            .add_header(country_name, country)
            .await;
    }

    let (name, value) = bearer("user_1");
    let stats: Value = app
        .server
        .get("/api/analytics")
        .add_query_param("interval", "last_7_days")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(stats["data"]["total"], 3);
    let india = stats["data"]["by_country"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["country_code"] == "IN")
        .cloned()
        .unwrap();
    assert_eq!(india["views"], 2);

    let permissions: Value = app
        .server
        .get("/api/permissions")
        .add_header(name, value)
        .await
        .json();
    assert_eq!(permissions["data"]["monthly_views"], 3);
}

#[tokio::test]
async fn test_analytics_denied_on_free_tier() {
    let app = spawn_app().await;
    app.subscribe("user_1", TierName::Free).await;
    let (name, value) = bearer("user_1");

    let response = app.server.get("/api/analytics").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_banner_reflects_discount_and_customization_changes() {
    let app = spawn_app().await;
    app.subscribe("user_1", TierName::Standard).await;
    let id = discounted_product(&app, "user_1").await;

    let first = banner_for_india(&app, &id).await.text();
    assert!(first.contains("PPP60"));
    assert!(first.contains("60%"));

    set_group_7_discount(&app, "user_1", &id, 70, "PPP70").await;
    let second = banner_for_india(&app, &id).await.text();
    assert!(second.contains("PPP70"));
    assert!(second.contains("70%"));
    assert!(!second.contains("PPP60"));

    let (name, value) = bearer("user_1");
    let updated = app
        .server
        .put(&format!("/api/products/{id}/customization"))
        .add_header(name, value)
        .json(&json!({
            "background_color": "hsl(120, 50%, 20%)",
            "text_color": "hsl(0, 0%, 100%)",
            "font_size": "1.25rem",
            "location_message": "Discount for {country}: {coupon}",
            "banner_container": "#checkout",
            "is_sticky": false
        }))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);

    let third = banner_for_india(&app, &id).await.text();
    assert!(third.contains("hsl(120, 50%, 20%)"));
    assert!(third.contains("Discount for India: PPP70"));
    assert!(third.contains("document.querySelector(\"#checkout\")"));
}

#[tokio::test]
async fn test_banner_for_owner_without_subscription_is_empty_not_found() {
    let app = spawn_app().await;
    let product = app
        .platform
        .store
        .insert_product(NewProduct {
            owner_id: UserId::new("ghost"),
            name: "Abandoned Course".into(),
            url: SITE.into(),
            description: None,
        })
        .await
        .unwrap();
    app.platform
        .store
        .insert_customization_if_absent(ProductCustomization::default_for(product.id))
        .await
        .unwrap();

    let response = banner_for_india(&app, &product.id.to_string()).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(response.text().is_empty());
}
