//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI document for the admin REST surface, for generating
//! dashboard client code without a running server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {e}");
            std::process::exit(1);
        }
    }
}
