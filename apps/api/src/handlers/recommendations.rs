use crate::{
    error::ApiError,
    models::RecommendationRequest,
    services::{recommendation::validate_query, PipelineEvent, RecommendationService},
};
use actix_web::{
    http::header,
    web::{self, Bytes, Json},
    HttpResponse,
};
use futures::StreamExt;
use log::error;
use std::convert::Infallible;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommendations").route(web::post().to(get_recommendations)))
        .service(
            web::resource("/recommendations/stream").route(web::post().to(stream_recommendations)),
        );
}

/// Runs a recommendation and returns the result panels and the finished text
/// in one JSON document.
pub async fn get_recommendations(
    request: Json<RecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    validate_query(&request.query)?;

    let response = recommendation_service
        .into_inner()
        .recommend_collected(request.into_inner().query)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// Runs a recommendation and streams its progress as Server-Sent Events.
///
/// An empty query is rejected with 400 before anything is streamed.
pub async fn stream_recommendations(
    request: Json<RecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    validate_query(&request.query)?;

    let events = recommendation_service
        .into_inner()
        .recommend(request.into_inner().query)
        .map(|event| Ok::<_, Infallible>(sse_frame(&event)));

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(events))
}

fn sse_frame(event: &PipelineEvent) -> Bytes {
    match serde_json::to_string(&event.payload()) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            error!("Failed to serialize pipeline event: {}", e);
            Bytes::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recommendation::fakes::Fakes;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn parse_events(body: &[u8]) -> Vec<Value> {
        std::str::from_utf8(body)
            .unwrap()
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[actix_web::test]
    async fn test_stream_emits_results_and_text() {
        let fakes = Fakes::default();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fakes.service()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations/stream")
            .set_json(json!({ "query": "a story about love and loss" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let events = parse_events(&test::read_body(resp).await);
        let types: Vec<&str> = events
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .filter(|t| *t != "stage")
            .collect();
        assert_eq!(types, vec!["results", "text", "text", "text", "done"]);

        let results = events.iter().find(|e| e["type"] == "results").unwrap();
        assert_eq!(results["recommendations"].as_array().unwrap().len(), 3);
        assert_eq!(results["recommendations"][0]["label"], "#1 Han Kang - Human Acts");
        assert_eq!(events.last().unwrap()["text"], "Hello world");
    }

    #[actix_web::test]
    async fn test_stream_rejects_blank_query_without_calls() {
        let fakes = Fakes::default();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fakes.service()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations/stream")
            .set_json(json!({ "query": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("describe"));
        assert!(fakes.log.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_stream_reports_search_failure() {
        let fakes = Fakes {
            search_fails: true,
            ..Fakes::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fakes.service()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations/stream")
            .set_json(json!({ "query": "query" }))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let events = parse_events(&body);

        assert!(!events.iter().any(|e| e["type"] == "results"));
        let last = events.last().unwrap();
        assert_eq!(last["type"], "failed");
        assert_eq!(last["stage"], "searching");
    }

    #[actix_web::test]
    async fn test_json_endpoint() {
        let fakes = Fakes::default();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fakes.service()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations")
            .set_json(json!({ "query": "query" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["recommendations"].as_array().unwrap().len(), 3);
        assert_eq!(body["recommendation_text"], "Hello world");
        assert!(body.get("error").is_none());
    }

    #[actix_web::test]
    async fn test_json_endpoint_upstream_failure() {
        let fakes = Fakes {
            translate_fails: true,
            ..Fakes::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fakes.service()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations")
            .set_json(json!({ "query": "query" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
