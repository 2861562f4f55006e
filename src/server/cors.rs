use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::{options, Request, Response};

/// Cross-origin headers for a browser frontend hosted on another origin.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allow_origin: String,
}

impl CorsPolicy {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self {
            allow_origin: allow_origin.into(),
        }
    }

    fn headers(&self) -> Vec<Header<'static>> {
        let mut headers = vec![
            Header::new("Access-Control-Allow-Origin", self.allow_origin.clone()),
            Header::new("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
            Header::new("Access-Control-Allow-Headers", "Content-Type"),
            Header::new("Access-Control-Max-Age", "86400"),
        ];
        // Caches must key on Origin once the answer depends on it.
        if self.allow_origin != "*" {
            headers.push(Header::new("Vary", "Origin"));
        }
        headers
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new("*")
    }
}

#[rocket::async_trait]
impl Fairing for CorsPolicy {
    fn info(&self) -> Info {
        Info {
            name: "Cross-origin policy",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        for header in self.headers() {
            response.set_header(header);
        }
    }
}

#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
