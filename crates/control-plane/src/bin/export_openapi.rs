// Print the OpenAPI document without starting the server
//
// Usage: cargo run --bin export-openapi > docs/openapi.json

use mailplate_control_plane::openapi::ApiDoc;

fn main() {
    println!("{}", ApiDoc::to_json());
}
