#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{FakeTransport, Trip, client, trips_page};
use futures_util::{StreamExt, TryStreamExt};
use http::StatusCode;
use odata_client::{NavigationPropertyResource, ODataResponse};

fn trips(client: &odata_client::ODataClient) -> NavigationPropertyResource<Trip> {
    client
        .entity_set::<common::Person>("People", "TripPin.Person")
        .entity("russellwhyte")
        .unwrap()
        .navigation_property::<Trip>("Trips")
        .unwrap()
        .top(2)
}

#[tokio::test]
async fn follows_skip_links_until_exhausted() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$top=2&$skip=2")));
    transport.respond_json(trips_page(&[3, 4], Some("$top=2&$skip=4")));
    transport.respond_json(trips_page(&[5], None));
    let client = client(transport.clone());

    let all = trips(&client).fetch_all().await.unwrap();

    assert_eq!(
        all.iter().map(|t| t.trip_id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(transport.request_count(), 3);
    let first = transport.request(0);
    assert_eq!(first.path, "https://svc.example/odata/People('russellwhyte')/Trips");
    assert!(!first.params.contains_key("$skip"));
    assert_eq!(transport.request(1).params["$skip"], "2");
    assert_eq!(transport.request(2).params["$skip"], "4");
    assert_eq!(transport.request(2).params["$top"], "2");
}

#[tokio::test]
async fn skiptoken_replaces_skip() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$skip=2&$skiptoken=abc")));
    transport.respond_json(trips_page(&[3], None));
    let client = client(transport.clone());

    let all = trips(&client).skip(10).fetch_all().await.unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(transport.request(0).params["$skip"], "10");
    let second = transport.request(1);
    assert_eq!(second.params["$skiptoken"], "abc");
    assert!(!second.params.contains_key("$skip"));
}

#[tokio::test]
async fn page_error_is_yielded_once_and_ends_the_stream() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$skip=2")));
    transport.respond(ODataResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom"));
    let client = client(transport.clone());

    let items: Vec<_> = trips(&client).all().collect().await;

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn fetch_all_fails_without_partial_result() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$skip=2")));
    transport.respond(ODataResponse::new(StatusCode::BAD_GATEWAY, ""));
    let client = client(transport.clone());

    let err = trips(&client).fetch_all().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
}

#[tokio::test]
async fn dropping_the_stream_stops_fetching() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$skip=2")));
    transport.respond_json(trips_page(&[3, 4], Some("$skip=4")));
    transport.respond_json(trips_page(&[5], None));
    let client = client(transport.clone());

    let first_three: Vec<Trip> = trips(&client).all().take(3).try_collect().await.unwrap();

    assert_eq!(first_three.len(), 3);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn pages_carry_count_and_links() {
    let transport = FakeTransport::new();
    let mut first = trips_page(&[1, 2], Some("$skip=2"));
    first["@odata.count"] = serde_json::json!(3);
    transport.respond_json(first);
    transport.respond_json(trips_page(&[3], None));
    let client = client(transport.clone());

    let pages: Vec<_> = trips(&client).pages().try_collect().await.unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].meta.count, Some(3));
    assert_eq!(pages[0].entities.len(), 2);
    assert!(pages[1].meta.next_link.is_none());
}

#[tokio::test]
async fn with_count_adds_the_count_option() {
    let transport = FakeTransport::new();
    let mut page = trips_page(&[1], None);
    page["@odata.count"] = serde_json::json!(1);
    transport.respond_json(page);
    let client = client(transport.clone());

    let page = trips(&client).collection(true).await.unwrap();

    assert_eq!(page.meta.count, Some(1));
    assert_eq!(transport.request(0).params["$count"], "true");
}

#[tokio::test]
async fn next_link_top_replaces_the_requested_top() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$top=1&$skip=2")));
    transport.respond_json(trips_page(&[3], None));
    let client = client(transport.clone());

    let all = trips(&client).top(3).fetch_all().await.unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(transport.request(0).params["$top"], "3");
    let second = transport.request(1);
    assert_eq!(second.params["$top"], "1");
    assert_eq!(second.params["$skip"], "2");
}

#[tokio::test]
async fn skip_link_drops_a_requested_skiptoken() {
    let transport = FakeTransport::new();
    transport.respond_json(trips_page(&[1, 2], Some("$skip=2")));
    transport.respond_json(trips_page(&[3], None));
    let client = client(transport.clone());

    let all = trips(&client).skiptoken("start").fetch_all().await.unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(transport.request(0).params["$skiptoken"], "start");
    let second = transport.request(1);
    assert_eq!(second.params["$skip"], "2");
    assert!(!second.params.contains_key("$skiptoken"));
}
