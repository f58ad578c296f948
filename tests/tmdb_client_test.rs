//! TMDB client tests against a mocked HTTP server.

use marquee::config::TmdbConfig;
use marquee::metadata::providers::TmdbProvider;
use marquee::metadata::MovieShowProvider;
use marquee_common::ExternalIds;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider(server: &MockServer) -> TmdbProvider {
    TmdbProvider::new(&TmdbConfig {
        api_key: "test-key".into(),
        base_url: format!("{}/3", server.uri()),
        ..Default::default()
    })
    .unwrap()
}

fn dune_detail(id: u64, date: &str, imdb: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": "Dune",
        "release_date": date,
        "imdb_id": imdb,
        "credits": {
            "cast": [
                {
                    "id": 1190668,
                    "name": "Timothée Chalamet",
                    "character": "Paul Atreides",
                    "profile_path": "/paul.jpg"
                }
            ]
        }
    })
}

// ---------------------------------------------------------------------------
// Movies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_movie_parses_detail_and_credits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/movie/438631"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("append_to_response", "credits"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(dune_detail(438631, "2021-09-15", "tt1160419")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let movie = provider(&server).await.get_movie("438631").await.unwrap().unwrap();

    assert_eq!(movie.id, "438631");
    assert_eq!(movie.imdb_id.as_deref(), Some("tt1160419"));
    assert_eq!(movie.cast.len(), 1);
    assert_eq!(movie.cast[0].character, "Paul Atreides");
    assert_eq!(movie.cast[0].person_id.as_deref(), Some("1190668"));
    assert_eq!(
        movie.cast[0].profile_path.as_deref(),
        Some("https://image.tmdb.org/t/p/original/paul.jpg")
    );
}

#[tokio::test]
async fn not_found_is_none_and_server_error_is_err() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/movie/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/movie/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tmdb = provider(&server).await;
    assert!(tmdb.get_movie("1").await.unwrap().is_none());
    assert!(tmdb.get_movie("2").await.is_err());
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/person/380"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/person/380"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 380,
            "name": "Robert De Niro",
            "imdb_id": "nm0000134"
        })))
        .mount(&server)
        .await;

    let person = provider(&server).await.get_person("380").await.unwrap().unwrap();
    assert_eq!(person.imdb_id.as_deref(), Some("nm0000134"));
}

#[tokio::test]
async fn search_disambiguates_by_year() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .and(query_param("query", "Dune"))
        .and(query_param("year", "2021"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": 841, "title": "Dune", "release_date": "1984-12-14" },
                { "id": 438631, "title": "Dune", "release_date": "2021-09-15" },
                { "id": 693134, "title": "Dune: Part Two", "release_date": "2024-02-27" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/movie/438631"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(dune_detail(438631, "2021-09-15", "tt1160419")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let movie = provider(&server)
        .await
        .search_movie("Dune", Some(2021), &ExternalIds::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(movie.id, "438631");
}

#[tokio::test]
async fn ambiguous_search_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": 841, "title": "Dune", "release_date": "1984-12-14" },
                { "id": 438631, "title": "Dune", "release_date": "2021-09-15" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/movie/841"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let found = provider(&server)
        .await
        .search_movie("Dune", None, &ExternalIds::default())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn known_imdb_id_uses_find() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/find/tt0087182"))
        .and(query_param("external_source", "imdb_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "movie_results": [{ "id": 841, "title": "Dune", "release_date": "1984-12-14" }],
            "tv_results": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/movie/841"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(dune_detail(841, "1984-12-14", "tt0087182")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let known = ExternalIds {
        imdb: Some("tt0087182".into()),
        ..Default::default()
    };
    let movie = provider(&server)
        .await
        .search_movie("Dune", None, &known)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(movie.id, "841");
}

#[tokio::test]
async fn conflicting_imdb_id_discards_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/find/tt9999999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "movie_results": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": 438631, "title": "Dune", "release_date": "2021-09-15" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/movie/438631"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(dune_detail(438631, "2021-09-15", "tt1160419")),
        )
        .mount(&server)
        .await;

    let known = ExternalIds {
        imdb: Some("tt9999999".into()),
        ..Default::default()
    };
    let found = provider(&server)
        .await
        .search_movie("Dune", None, &known)
        .await
        .unwrap();
    assert!(found.is_none());
}

// ---------------------------------------------------------------------------
// Shows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_show_merges_episode_ids_and_guest_stars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/tv/1399"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1399,
            "name": "Game of Thrones",
            "first_air_date": "2011-04-17",
            "external_ids": { "imdb_id": "tt0944947", "tvdb_id": 121361 },
            "credits": { "cast": [{ "id": 22970, "name": "Peter Dinklage", "character": "Tyrion Lannister" }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/tv/1399/season/1/episode/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 63056,
            "external_ids": { "imdb_id": "tt1480055", "tvdb_id": 3254641 },
            "credits": {
                "cast": [{ "id": 48, "name": "Sean Bean", "character": "Eddard Stark" }],
                "guest_stars": [{ "id": 1, "name": "Susan Brown", "character": "Septa Mordane" }]
            }
        })))
        .mount(&server)
        .await;

    let show = provider(&server)
        .await
        .get_show("1399", Some(1), Some(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(show.name, "Game of Thrones");
    assert_eq!(show.show_ids.imdb(), Some("tt0944947"));
    assert_eq!(show.show_ids.tvdb(), Some("121361"));
    assert_eq!(show.show_ids.tmdb(), Some("1399"));
    assert_eq!(show.episode_ids.imdb(), Some("tt1480055"));
    assert_eq!(show.episode_ids.tvdb(), Some("3254641"));
    assert_eq!(show.episode_ids.tmdb(), Some("63056"));
    assert_eq!(show.cast[0].name, "Sean Bean");
    assert_eq!(show.guest_stars[0].character, "Septa Mordane");
    assert_eq!(show.credits().count(), 2);
}

#[tokio::test]
async fn search_show_prefers_known_tvdb_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/find/121361"))
        .and(query_param("external_source", "tvdb_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tv_results": [{ "id": 1399, "name": "Game of Thrones", "first_air_date": "2011-04-17" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/tv/1399"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1399,
            "name": "Game of Thrones",
            "external_ids": { "imdb_id": "tt0944947", "tvdb_id": 121361 }
        })))
        .mount(&server)
        .await;

    let known = ExternalIds {
        tvdb: Some("121361".into()),
        ..Default::default()
    };
    let show = provider(&server)
        .await
        .search_show("Game of Thrones", None, &known, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(show.id, "1399");
    assert!(show.guest_stars.is_empty());
}

#[tokio::test]
async fn search_show_by_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/search/tv"))
        .and(query_param("query", "The Wire"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": 1438, "name": "The Wire", "first_air_date": "2002-06-02" },
                { "id": 5, "name": "The Wired", "first_air_date": "2019-01-01" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/tv/1438"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1438,
            "name": "The Wire",
            "external_ids": { "imdb_id": "tt0306414", "tvdb_id": 79126 }
        })))
        .mount(&server)
        .await;

    let show = provider(&server)
        .await
        .search_show("The Wire", None, &ExternalIds::default(), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(show.show_ids.imdb(), Some("tt0306414"));
}

#[tokio::test]
async fn search_without_results_field_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "page": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/search/tv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let tmdb = provider(&server).await;
    let movie = tmdb
        .search_movie("Nothing Here", None, &ExternalIds::default())
        .await
        .unwrap();
    assert!(movie.is_none());

    let show = tmdb
        .search_show("Nothing Here", None, &ExternalIds::default(), None, None)
        .await
        .unwrap();
    assert!(show.is_none());
}
