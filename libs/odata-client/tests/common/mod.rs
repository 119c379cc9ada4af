#![allow(dead_code, clippy::must_use_candidate, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use odata_client::{
    EntityParser, FieldKind, ODataClient, ODataClientConfig, ODataRequest, ODataResponse,
    ParserRegistry, Transport, TransportError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SERVICE_ROOT: &str = "https://svc.example/odata";

/// Records every request and answers from a queue of canned responses.
#[derive(Default)]
pub struct FakeTransport {
    requests: Mutex<Vec<ODataRequest>>,
    responses: Mutex<VecDeque<ODataResponse>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: ODataResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn respond_json(&self, body: Value) {
        self.respond(ODataResponse::json(StatusCode::OK, &body));
    }

    pub fn requests(&self) -> Vec<ODataRequest> {
        self.requests.lock().clone()
    }

    pub fn request(&self, index: usize) -> ODataRequest {
        self.requests.lock()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: ODataRequest) -> Result<ODataResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::failed("no response queued"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub user_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(rename = "@odata.etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Person {
    pub fn new(user_name: &str) -> Self {
        Self {
            user_name: user_name.to_owned(),
            first_name: None,
            etag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Trip {
    pub trip_id: i64,
}

pub fn registry() -> ParserRegistry {
    let mut registry = ParserRegistry::default();
    registry
        .register(
            EntityParser::new("TripPin.Person")
                .key(["UserName"])
                .field(
                    "Trips",
                    FieldKind::Collection(Box::new(FieldKind::Related("TripPin.Trip".into()))),
                )
                .field("BestFriend", FieldKind::Related("TripPin.Person".into())),
        )
        .register(
            EntityParser::new("TripPin.Trip")
                .key(["TripId"])
                .field("TripId", FieldKind::Int64),
        )
        .register(EntityParser::new("Shop.OrderLine").key(["OrderId", "Line"]))
        .callable("TripPin.GetNearestAirport", "GetNearestAirport")
        .callable("TripPin.ShareTrip", "TripPin.ShareTrip");
    registry
}

pub fn client(transport: Arc<FakeTransport>) -> ODataClient {
    ODataClient::builder(ODataClientConfig::new(SERVICE_ROOT), transport)
        .registry(registry())
        .build()
        .unwrap()
}

/// Collection page holding `ids`, continued by `next` when given.
pub fn trips_page(ids: &[i64], next: Option<&str>) -> Value {
    let mut page = json!({
        "@odata.context": "$metadata#People('russellwhyte')/Trips",
        "value": ids.iter().map(|id| json!({"TripId": id})).collect::<Vec<_>>(),
    });
    if let Some(next) = next {
        page["@odata.nextLink"] = json!(format!("{SERVICE_ROOT}/People('russellwhyte')/Trips?{next}"));
    }
    page
}
