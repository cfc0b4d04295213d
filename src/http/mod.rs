//! JSON HTTP surface, spec §6.2. Grounded in shape on the teacher's
//! `farm-rpc/src/json_rpc.rs`: a `Cors` fairing copied near-verbatim, routes
//! mounted under `/api/v1`, state handed to handlers through Rocket's
//! `State<...>`. Outcomes map to HTTP status per spec §7: success → 200 with
//! a JSON body, every rejection → 400 with `{message: <reason>}`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::response::Response;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde_derive::{Deserialize, Serialize};

use crate::domain::Auction;
use crate::service::{
    AuctionService, CancelAuctionOutcome, CreateAuctionOutcome, LockPoisoned, ProcessBidOutcome, StopAuctionOutcome,
};

/// Wire format for every timestamp in the HTTP surface: `YYYY-MM-DD
/// HH:MM:SS.ffffff`, UTC, microsecond precision (spec §6.2), grounded in
/// `original_source/main/requestsresponses.go`'s `layout :=
/// "2006-01-02 15:04:05.000000"`.
const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_wire_time(t: DateTime<Utc>) -> String {
    t.format(WIRE_TIME_FORMAT).to_string()
}

pub fn parse_wire_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, WIRE_TIME_FORMAT)
        .ok()
        .map(|naive| DateTime::<Utc>::from_utc(naive, Utc))
}

mod wire_time {
    use super::{format_wire_time, parse_wire_time};
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_wire_time(*t))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_wire_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("malformed time string: {}", raw)))
    }
}

pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, OPTIONS"));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// Every rejection is reported this way: 400 with a single human-readable
/// message, per spec §7.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn ok(message: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse { message: message.into() })
}

fn bad_request(message: impl Into<String>) -> (Status, Json<MessageResponse>) {
    (Status::BadRequest, Json(MessageResponse { message: message.into() }))
}

fn lock_poisoned(_: LockPoisoned) -> (Status, Json<MessageResponse>) {
    (
        Status::InternalServerError,
        Json(MessageResponse {
            message: "auction service is temporarily unavailable".to_string(),
        }),
    )
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct RequestCreateAuction {
    #[serde(rename = "itemid")]
    pub item_id: String,
    #[serde(rename = "selleruserid")]
    pub seller_user_id: String,
    #[serde(rename = "starttime", with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "endtime", with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "startpriceincents")]
    pub start_price_in_cents: i64,
}

#[post("/Auctions", data = "<request>")]
async fn create_auction(
    request: Json<RequestCreateAuction>,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<MessageResponse>, (Status, Json<MessageResponse>)> {
    let outcome = service
        .create_auction(
            &request.item_id,
            &request.seller_user_id,
            request.start_time,
            request.end_time,
            request.start_price_in_cents,
        )
        .map_err(lock_poisoned)?;
    match outcome {
        CreateAuctionOutcome::Created => Ok(ok("auction created")),
        CreateAuctionOutcome::BadTime => Err(bad_request("end time must be after start time")),
        CreateAuctionOutcome::StartsInPast => Err(bad_request("auction would start in the past")),
        CreateAuctionOutcome::StartsTooSoon => {
            Err(bad_request("auction starts too soon (must be more than 5 minutes out)"))
        }
        CreateAuctionOutcome::NegativeStartPrice => Err(bad_request("start price must be nonnegative")),
        CreateAuctionOutcome::AlreadyCreated => Err(bad_request("an auction already exists for this item")),
    }
}

/// Spec §6.2 documents this path with a trailing slash; Rocket does not
/// normalize trailing slashes the way the original's `mux.StrictSlash(true)`
/// did, so both forms are registered against the same handler.
#[post("/Auctions/", data = "<request>")]
async fn create_auction_trailing_slash(
    request: Json<RequestCreateAuction>,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<MessageResponse>, (Status, Json<MessageResponse>)> {
    create_auction(request, service).await
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct RequestPlaceBid {
    #[serde(rename = "itemid")]
    pub item_id: String,
    #[serde(rename = "selleruserid")]
    pub bidder_user_id: String,
    #[serde(rename = "amountincents")]
    pub amount_in_cents: i64,
}

#[derive(Serialize)]
pub struct ResponsePlaceBid {
    pub message: String,
    pub was_new_top_bid: bool,
}

#[post("/Bids", data = "<request>")]
async fn place_bid(
    request: Json<RequestPlaceBid>,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<ResponsePlaceBid>, (Status, Json<MessageResponse>)> {
    if request.amount_in_cents < 0 {
        return Err(bad_request("bid amount must be nonnegative"));
    }
    let now = Utc::now();
    let result = service
        .process_new_bid(&request.item_id, &request.bidder_user_id, now, request.amount_in_cents)
        .map_err(lock_poisoned)?;

    match result.outcome {
        ProcessBidOutcome::NegativeAmount => Err(bad_request("bid amount must be nonnegative")),
        ProcessBidOutcome::AuctionNotExist => Err(bad_request("auction does not exist")),
        ProcessBidOutcome::Processed if result.was_new_top_bid => Ok(Json(ResponsePlaceBid {
            message: "bid accepted as new top bid".to_string(),
            was_new_top_bid: true,
        })),
        ProcessBidOutcome::Processed => Err(bad_request(format!(
            "bid was not accepted; auction state is {:?}",
            result.state
        ))),
    }
}

/// See [`create_auction_trailing_slash`] for why this alias exists.
#[post("/Bids/", data = "<request>")]
async fn place_bid_trailing_slash(
    request: Json<RequestPlaceBid>,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<ResponsePlaceBid>, (Status, Json<MessageResponse>)> {
    place_bid(request, service).await
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct RequestCancelAuction {
    #[serde(rename = "requesteruserid")]
    pub requester_user_id: String,
}

#[post("/cancelAuction/<item_id>", data = "<request>")]
async fn cancel_auction(
    item_id: &str,
    request: Json<RequestCancelAuction>,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<MessageResponse>, (Status, Json<MessageResponse>)> {
    match service
        .cancel_auction(item_id, &request.requester_user_id)
        .map_err(lock_poisoned)?
    {
        CancelAuctionOutcome::Canceled => Ok(ok("auction canceled")),
        CancelAuctionOutcome::AuctionNotExist => Err(bad_request("auction does not exist")),
        CancelAuctionOutcome::RequesterIsNotSeller => {
            Err(bad_request("requester is not the auction's seller"))
        }
        CancelAuctionOutcome::AlreadyFinalized => Err(bad_request("auction has already been finalized")),
        CancelAuctionOutcome::AlreadyCanceled => Err(bad_request("auction has already been canceled")),
        CancelAuctionOutcome::AlreadyOver => Err(bad_request("auction is already over")),
        CancelAuctionOutcome::ActiveWithBid => {
            Err(bad_request("cannot cancel a live auction with an active bid"))
        }
    }
}

#[post("/stopAuction/<item_id>")]
async fn stop_auction(
    item_id: &str,
    service: &State<Arc<AuctionService>>,
) -> Result<Json<MessageResponse>, (Status, Json<MessageResponse>)> {
    match service.stop_auction(item_id).map_err(lock_poisoned)? {
        StopAuctionOutcome::Stopped => Ok(ok("auction stopped")),
        StopAuctionOutcome::AuctionNotExist => Err(bad_request("auction does not exist")),
        StopAuctionOutcome::AlreadyFinalized => Err(bad_request("auction has already been finalized")),
        StopAuctionOutcome::AlreadyCanceled => Err(bad_request("auction has already been canceled")),
        StopAuctionOutcome::AlreadyOver => Err(bad_request("auction is already over")),
    }
}

#[derive(Serialize)]
pub struct ResponseItemsUserHasBidsOn {
    pub itemids: Vec<String>,
}

#[get("/ItemsUserHasBidsOn/<user_id>")]
async fn items_user_has_bids_on(
    user_id: &str,
    service: &State<Arc<AuctionService>>,
) -> Json<ResponseItemsUserHasBidsOn> {
    Json(ResponseItemsUserHasBidsOn {
        itemids: service.get_items_user_has_bids_on(user_id),
    })
}

#[derive(Serialize)]
pub struct JsonAuction {
    pub itemid: String,
    pub selleruserid: String,
    pub starttime: String,
    pub endtime: String,
    pub startpriceincents: i64,
}

fn export_auction(auction: &Auction) -> JsonAuction {
    JsonAuction {
        itemid: auction.item.item_id.clone(),
        selleruserid: auction.item.seller_user_id.clone(),
        starttime: format_wire_time(auction.item.start_time),
        endtime: format_wire_time(auction.item.end_time),
        startpriceincents: auction.item.start_price_in_cents,
    }
}

#[derive(Serialize)]
pub struct ResponseActiveAuctions {
    pub activeauctions: Vec<JsonAuction>,
}

#[get("/activeAuctions")]
async fn active_auctions(service: &State<Arc<AuctionService>>) -> Json<ResponseActiveAuctions> {
    Json(ResponseActiveAuctions {
        activeauctions: service.get_active_auctions().iter().map(export_auction).collect(),
    })
}

pub fn mount(rocket: Rocket<Build>, service: Arc<AuctionService>) -> Rocket<Build> {
    rocket.manage(service).attach(Cors).mount(
        "/api/v1",
        routes![
            create_auction,
            create_auction_trailing_slash,
            place_bid,
            place_bid_trailing_slash,
            cancel_auction,
            stop_auction,
            items_user_has_bids_on,
            active_auctions,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_time_round_trips_with_microsecond_precision() {
        let t = "2014-02-04T01:00:00.123456Z".parse::<DateTime<Utc>>().unwrap();
        let formatted = format_wire_time(t);
        assert_eq!(formatted, "2014-02-04 01:00:00.123456");
        assert_eq!(parse_wire_time(&formatted), Some(t));
    }

    #[test]
    fn parse_wire_time_rejects_malformed_input() {
        assert_eq!(parse_wire_time("not-a-time"), None);
    }
}
