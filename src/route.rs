use std::fmt::{Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::geo_math;
use crate::types::{GeoPoint, RouteEstimate};

/// Errors from the route computation service
#[derive(Debug, Clone)]
pub enum RouteError {
    NetworkTimeout,
    HttpStatus(u16),
    InvalidResponse(String),
    NoRoute,
    Other(String),
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RouteError::NetworkTimeout => write!(f, "network timeout"),
            RouteError::HttpStatus(code) => write!(f, "HTTP error: {}", code),
            RouteError::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            RouteError::NoRoute => write!(f, "no route found"),
            RouteError::Other(msg) => write!(f, "route service error: {}", msg),
        }
    }
}

impl std::error::Error for RouteError {}

/// Remaining-route computation between a live position and the ride's
/// destination. Implementations may be slow or fail; callers treat them as
/// unreliable and keep the previous route on error.
#[async_trait]
pub trait RouteService: Send + Sync {
    async fn get_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RouteEstimate, RouteError>;
}

/// OSRM-style HTTP routing client
///
/// # Request Format
/// ```text
/// GET {base_url}/route/v1/driving/{lon},{lat};{lon},{lat}
///     ?overview=full&geometries=polyline
/// ```
///
/// # Error Handling
/// - Network timeout: transient, retried with exponential backoff (1s, 2s)
/// - Non-2xx status: returned as `HttpStatus` without retry
/// - Malformed body or `code != "Ok"`: `InvalidResponse` / `NoRoute`
pub struct HttpRouteService {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    geometry: String,
    distance: f64,
    duration: f64,
}

impl HttpRouteService {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Ride Tracker/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        HttpRouteService {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 2,
        }
    }

    fn build_url(&self, origin: &GeoPoint, destination: &GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=polyline",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
        )
    }

    fn parse_response(body: &str) -> Result<RouteEstimate, RouteError> {
        let parsed: OsrmResponse = serde_json::from_str(body)
            .map_err(|e| RouteError::InvalidResponse(e.to_string()))?;
        if parsed.code != "Ok" {
            return Err(RouteError::NoRoute);
        }
        let route = parsed.routes.into_iter().next().ok_or(RouteError::NoRoute)?;
        Ok(RouteEstimate {
            encoded_polyline: route.geometry,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}

#[async_trait]
impl RouteService for HttpRouteService {
    async fn get_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RouteEstimate, RouteError> {
        let url = self.build_url(&origin, &destination);

        for attempt in 0..=self.max_retries {
            let response = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    if attempt < self.max_retries {
                        let backoff = 2u64.pow(attempt);
                        log::warn!(
                            "[route] timeout on attempt {}/{}, retrying in {}s",
                            attempt + 1,
                            self.max_retries + 1,
                            backoff
                        );
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        continue;
                    }
                    return Err(RouteError::NetworkTimeout);
                }
                Err(e) => return Err(RouteError::Other(e.to_string())),
            };

            let status = response.status();
            if !status.is_success() {
                return Err(RouteError::HttpStatus(status.as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|e| RouteError::Other(e.to_string()))?;
            return Self::parse_response(&body);
        }

        Err(RouteError::NetworkTimeout)
    }
}

/// Geodesic fallback router: a two-point "route" straight to the destination
/// with an ETA from an assumed average speed. Used by the demo feed and as a
/// test double; produces an opaque `lat,lon;lat,lon` polyline.
pub struct StraightLineRouter {
    assumed_speed_kmh: f64,
}

impl StraightLineRouter {
    pub fn new(assumed_speed_kmh: f64) -> Self {
        StraightLineRouter { assumed_speed_kmh }
    }
}

#[async_trait]
impl RouteService for StraightLineRouter {
    async fn get_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RouteEstimate, RouteError> {
        let distance_m = geo_math::haversine_distance_m(&origin, &destination);
        let duration_s = distance_m / (self.assumed_speed_kmh / 3.6);
        Ok(RouteEstimate {
            encoded_polyline: format!(
                "{:.6},{:.6};{:.6},{:.6}",
                origin.latitude, origin.longitude,
                destination.latitude, destination.longitude,
            ),
            distance_m,
            duration_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_build_url() {
        let service = HttpRouteService::new("http://localhost:5000/");
        let origin = GeoPoint::new(37.7749, -122.4194);
        let destination = GeoPoint::new(37.8044, -122.2712);
        let url = service.build_url(&origin, &destination);

        assert!(url.starts_with("http://localhost:5000/route/v1/driving/"));
        assert!(url.contains("-122.4194,37.7749;-122.2712,37.8044"));
        assert!(url.contains("overview=full"));
        assert!(url.contains("geometries=polyline"));
    }

    #[test]
    fn test_parse_response_ok() {
        let body = r#"{
            "code": "Ok",
            "routes": [
                {"geometry": "abc123", "distance": 4321.5, "duration": 600.0}
            ]
        }"#;
        let est = HttpRouteService::parse_response(body).unwrap();
        assert_eq!(est.encoded_polyline, "abc123");
        assert_relative_eq!(est.distance_m, 4321.5);
        assert_relative_eq!(est.duration_s, 600.0);
    }

    #[test]
    fn test_parse_response_no_route() {
        let body = r#"{"code": "NoRoute", "routes": []}"#;
        assert!(matches!(
            HttpRouteService::parse_response(body),
            Err(RouteError::NoRoute)
        ));

        let body = r#"{"code": "Ok", "routes": []}"#;
        assert!(matches!(
            HttpRouteService::parse_response(body),
            Err(RouteError::NoRoute)
        ));
    }

    #[test]
    fn test_parse_response_malformed() {
        assert!(matches!(
            HttpRouteService::parse_response("not json"),
            Err(RouteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_route_error_display() {
        let errors = vec![
            RouteError::NetworkTimeout,
            RouteError::HttpStatus(503),
            RouteError::InvalidResponse("bad".to_string()),
            RouteError::NoRoute,
            RouteError::Other("boom".to_string()),
        ];
        for err in errors {
            assert!(!format!("{}", err).is_empty());
        }
    }

    #[tokio::test]
    async fn test_straight_line_router_estimate() {
        let router = StraightLineRouter::new(36.0);
        let origin = GeoPoint::new(37.7749, -122.4194);
        let destination = crate::geo_math::destination_point(&origin, 90.0, 5_000.0);
        let est = router.get_route(origin, destination).await.unwrap();

        assert_relative_eq!(est.distance_m, 5_000.0, epsilon = 1.0);
        // 36 km/h = 10 m/s -> 500 s
        assert_relative_eq!(est.duration_s, 500.0, epsilon = 0.5);
        assert!(est.encoded_polyline.contains(';'));
    }

    // Integration test (requires a local OSRM instance, disabled by default)
    #[tokio::test]
    #[ignore]
    async fn test_http_route_service_integration() {
        let service = HttpRouteService::new("http://localhost:5000");
        let origin = GeoPoint::new(37.7749, -122.4194);
        let destination = GeoPoint::new(37.8044, -122.2712);
        match service.get_route(origin, destination).await {
            Ok(est) => {
                assert!(est.distance_m > 0.0);
                assert!(est.duration_s > 0.0);
                assert!(!est.encoded_polyline.is_empty());
            }
            Err(e) => panic!("route fetch failed: {}", e),
        }
    }
}
