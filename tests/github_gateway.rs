use preorder_admin::domain::TitleId;
use preorder_admin::gateway::{ApprovalTracker, GatewayError, GithubTracker, NewIssue};
use preorder_kernel::settings::{GatewaySettings, GithubSettings};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUES_PATH: &str = "/repos/acme/preorders/issues";

fn tracker(server: &MockServer) -> GithubTracker {
    let github = GithubSettings {
        token: Some("ghp_test".into()),
        repository: Some("acme/preorders".into()),
        api_base: server.uri(),
        ..GithubSettings::default()
    };
    GithubTracker::new(&github, &GatewaySettings::default()).unwrap()
}

fn issue(number: u64, body: &str) -> Value {
    json!({
        "number": number,
        "title": format!("Preorder Approvals #{number}"),
        "body": body,
        "html_url": format!("https://github.com/acme/preorders/issues/{number}"),
        "state": "open",
        "created_at": "2025-03-03T09:00:00Z"
    })
}

#[tokio::test]
async fn lists_labelled_issues_across_pages_without_pull_requests() {
    let server = MockServer::start().await;

    let first_page: Vec<Value> = (1..=100)
        .map(|number| {
            if number == 7 {
                let mut pull = issue(number, "");
                pull["pull_request"] = json!({ "url": "https://api.github.com/pulls/7" });
                pull
            } else {
                issue(number, "| [x] | 9780000000001 | Book | 2025-03-01 | 2 |")
            }
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(ISSUES_PATH))
        .and(query_param("state", "open"))
        .and(query_param("labels", "preorder-approval"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer ghp_test"))
        .and(header("Accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(ISSUES_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![issue(101, "nothing ticked")]))
        .expect(1)
        .mount(&server)
        .await;

    let issues = tracker(&server).list_open_issues().await.unwrap();

    assert_eq!(issues.len(), 100);
    assert!(issues.iter().all(|issue| issue.number != 7));
    assert_eq!(issues[0].checked_ids(), vec![TitleId::new("9780000000001")]);
    assert_eq!(issues[99].number, 101);
    assert!(issues[99].checked_ids().is_empty());
}

#[tokio::test]
async fn creates_an_issue_with_labels() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ISSUES_PATH))
        .and(body_json(json!({
            "title": "Preorder Approvals for Week of March 10, 2025",
            "body": "checklist",
            "labels": ["preorder-approval"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue(42, "checklist")))
        .expect(1)
        .mount(&server)
        .await;

    let created = tracker(&server)
        .create_issue(&NewIssue {
            title: "Preorder Approvals for Week of March 10, 2025".into(),
            body: "checklist".into(),
            labels: vec!["preorder-approval".into()],
        })
        .await
        .unwrap();

    assert_eq!(created.number, 42);
    assert_eq!(created.url, "https://github.com/acme/preorders/issues/42");
    assert_eq!(created.state, "open");
}

#[tokio::test]
async fn comments_on_an_issue() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{ISSUES_PATH}/42/comments")))
        .and(body_json(json!({ "body": "Recorded approval for 1 title(s):\n- 9780000000001" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    tracker(&server)
        .comment(42, "Recorded approval for 1 title(s):\n- 9780000000001")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_requests_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ISSUES_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let err = tracker(&server).list_open_issues().await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Rejected {
            service: "github",
            status: 401,
            body: "Bad credentials".into(),
        }
    );
}
