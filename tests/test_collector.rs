//! End-to-end collection against a scripted Remote Call.

mod common;

use common::{bag, ScriptedRemote};
use record_collector::schema::is_nested_array;
use record_collector::{
    Collector, CollectorConfig, CollectorError, ErrorOutcome, ParamBag, ParamDescriptor, RemoteError,
    RequestContext, Schema, SchemaRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_config() -> CollectorConfig {
    CollectorConfig {
        retry_interval_ms: 1,
        ..CollectorConfig::default()
    }
}

fn collector(schemas: Vec<Schema>, remote: &Arc<ScriptedRemote>) -> Collector {
    let mut registry = SchemaRegistry::new();
    for schema in schemas {
        registry.register(schema).unwrap();
    }
    Collector::with_config(registry, remote.clone(), fast_config())
}

fn accounts() -> Schema {
    Schema::builder("Accounts", "listAccounts")
        .namespace("Organizations", json!({}))
        .value_path("AccountIds")
        .build()
        .unwrap()
}

fn instances() -> Schema {
    Schema::builder("Instances", "describeInstances")
        .namespace("EC2", json!({"apiVersion": "2016-11-15"}))
        .param("MaxResults", json!(1000))
        .required_param("region", ParamDescriptor::new(1))
        .required_param(
            "accountId",
            ParamDescriptor::new(1).default_source("Accounts", ParamBag::new()),
        )
        .value_path("Reservations")
        .build()
        .unwrap()
}

fn instances_remote() -> Arc<ScriptedRemote> {
    Arc::new(
        ScriptedRemote::new()
            .always("listAccounts", json!({"AccountIds": ["111", "222"]}))
            .on("describeInstances", |params, _| {
                Ok(json!({"Reservations": [{"account": params["accountId"], "region": params["region"]}]}))
            }),
    )
}

#[tokio::test]
async fn test_instances_fan_out_over_resolved_accounts() {
    let remote = instances_remote();
    let collector = collector(vec![accounts(), instances()], &remote);

    let records = collector
        .lookup_records("Instances", bag(json!({"region": "us-east-1"})))
        .await
        .unwrap();

    assert_eq!(
        records,
        vec![
            json!({"account": "111", "region": "us-east-1"}),
            json!({"account": "222", "region": "us-east-1"}),
        ]
    );

    assert_eq!(remote.calls_to("listAccounts").len(), 1);

    let mut params: Vec<Value> = remote
        .calls_to("describeInstances")
        .into_iter()
        .map(|call| call.params)
        .collect();
    params.sort_by_key(|p| p["accountId"].as_str().unwrap_or_default().to_string());
    assert_eq!(
        params,
        vec![
            json!({"MaxResults": 1000, "region": "us-east-1", "accountId": "111"}),
            json!({"MaxResults": 1000, "region": "us-east-1", "accountId": "222"}),
        ]
    );
}

#[tokio::test]
async fn test_ambient_config_reaches_every_client() {
    let remote = instances_remote();
    let collector = collector(vec![accounts(), instances()], &remote);

    collector
        .lookup_records(
            "Instances",
            bag(json!({
                "region": "us-east-1",
                "awsConfig": {"region": "us-east-1", "credentials": {"accessKeyId": "AKIA"}}
            })),
        )
        .await
        .unwrap();

    for call in remote.calls() {
        assert_eq!(call.client.args["credentials"]["accessKeyId"], "AKIA");
        assert!(call.params.get("awsConfig").is_none());
    }
    let ec2 = &remote.calls_to("describeInstances")[0].client;
    assert_eq!(ec2.namespace, "EC2");
    assert_eq!(ec2.args["apiVersion"], "2016-11-15");
}

#[tokio::test]
async fn test_no_required_params_single_call() {
    let remote = Arc::new(ScriptedRemote::new().always("listAccounts", json!({"AccountIds": ["111"]})));
    let schema = Schema::builder("Accounts", "listAccounts")
        .param("MaxResults", json!(20))
        .value_path("AccountIds")
        .build()
        .unwrap();
    let collector = collector(vec![schema], &remote);

    let records = collector
        .lookup_records("Accounts", bag(json!({"Filter": "ACTIVE"})))
        .await
        .unwrap();

    assert_eq!(records, vec![json!("111")]);
    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params, json!({"MaxResults": 20, "Filter": "ACTIVE"}));
}

#[tokio::test]
async fn test_pagination_builds_next_call_from_previous_response() {
    let remote = Arc::new(ScriptedRemote::new().on("listBuckets", |_, index| match index {
        0 => Ok(json!({"Buckets": [{"Name": "a"}, {"Name": "b"}], "IsTruncated": true, "NextMarker": "b"})),
        _ => Ok(json!({"Buckets": [{"Name": "c"}], "IsTruncated": false})),
    }));
    let schema = Schema::builder("Buckets", "listBuckets")
        .value_path("Buckets")
        .paginate("IsTruncated", |current, response| {
            let mut next = current.clone();
            next.insert("Marker".into(), response["NextMarker"].clone());
            next
        })
        .build()
        .unwrap();
    let collector = collector(vec![schema], &remote);

    let records = collector.lookup_records("Buckets", ParamBag::new()).await.unwrap();

    let names: Vec<&str> = records.iter().filter_map(|r| r["Name"].as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    let calls = remote.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].params, json!({}));
    assert_eq!(calls[1].params, json!({"Marker": "b"}));
}

#[tokio::test]
async fn test_retry_exhaustion_stops_at_max_attempts() {
    let remote = Arc::new(
        ScriptedRemote::new().on("listAccounts", |_, _| {
            Err(RemoteError::transient("Rate exceeded").with_code("Throttling"))
        }),
    );
    let collector = collector(vec![accounts()], &remote);

    let result = collector.lookup_records("Accounts", ParamBag::new()).await;

    match result {
        Err(CollectorError::RetriesExhausted {
            schema,
            method,
            attempts,
            source,
            ..
        }) => {
            assert_eq!(schema, "Accounts");
            assert_eq!(method, "listAccounts");
            assert_eq!(attempts, 10);
            assert_eq!(source.code.as_deref(), Some("Throttling"));
        }
        other => panic!("expected retry exhaustion, got {:?}", other),
    }
    assert_eq!(remote.calls().len(), 10);
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let remote = Arc::new(ScriptedRemote::new().on("listAccounts", |_, index| {
        if index < 3 {
            Err(RemoteError::transient("connection reset"))
        } else {
            Ok(json!({"AccountIds": ["111"]}))
        }
    }));
    let collector = collector(vec![accounts()], &remote);

    let records = collector.lookup_records("Accounts", ParamBag::new()).await.unwrap();
    assert_eq!(records, vec![json!("111")]);
    assert_eq!(remote.calls().len(), 4);
}

#[tokio::test]
async fn test_non_retryable_error_fails_once() {
    let remote = Arc::new(ScriptedRemote::new().on("listAccounts", |_, _| {
        Err(RemoteError::fatal("not authorized").with_code("AccessDenied"))
    }));
    let collector = collector(vec![accounts()], &remote);

    let result = collector.lookup_records("Accounts", ParamBag::new()).await;

    assert!(matches!(result, Err(CollectorError::RemoteCall { .. })));
    assert_eq!(remote.calls().len(), 1);
}

#[tokio::test]
async fn test_error_hook_recovers_with_response() {
    let remote = Arc::new(ScriptedRemote::new().on("getBucketPolicy", |params, _| {
        if params["Bucket"] == "private" {
            Err(RemoteError::fatal("no policy")
                .with_code("NoSuchBucketPolicy")
                .with_response(json!({"Code": "NoSuchBucketPolicy"})))
        } else {
            Ok(json!({"Policy": {"Bucket": params["Bucket"]}}))
        }
    }));
    let schema = Schema::builder("BucketPolicies", "getBucketPolicy")
        .required_param("Bucket", ParamDescriptor::new(1))
        .value_path("Policy")
        .on_error(|err| match err.code.as_deref() {
            Some("NoSuchBucketPolicy") => ErrorOutcome::Recover(json!({"Policy": []})),
            _ => ErrorOutcome::Fail(err),
        })
        .build()
        .unwrap();
    let collector = collector(vec![schema], &remote);

    let records = collector
        .lookup_records("BucketPolicies", bag(json!({"Bucket": ["public", "private", "shared"]})))
        .await
        .unwrap();

    assert_eq!(
        records,
        vec![json!({"Bucket": "public"}), json!({"Bucket": "shared"})]
    );
}

#[tokio::test]
async fn test_extraction_error_names_schema_and_path() {
    let remote = Arc::new(ScriptedRemote::new().always("listAccounts", json!({"Accounts": []})));
    let collector = collector(vec![accounts()], &remote);

    let err = collector
        .lookup_records("Accounts", ParamBag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CollectorError::Extraction { .. }));
    let message = err.to_string();
    assert!(message.contains("Accounts"));
    assert!(message.contains("AccountIds"));
    assert_eq!(remote.calls().len(), 1);
}

#[tokio::test]
async fn test_batch_splitting_end_to_end() {
    let remote = Arc::new(ScriptedRemote::new().on("describeInstances", |params, _| {
        let ids = params["InstanceIds"].as_array().cloned().unwrap_or_default();
        let records: Vec<Value> = ids.into_iter().map(|id| json!({"InstanceId": id})).collect();
        Ok(json!({"Instances": records}))
    }));
    let schema = Schema::builder("InstancesById", "describeInstances")
        .required_param("InstanceIds", ParamDescriptor::new(2).detect_array(is_nested_array))
        .value_path("Instances")
        .build()
        .unwrap();
    let collector = collector(vec![schema], &remote);

    let records = collector
        .lookup_records(
            "InstancesById",
            bag(json!({"InstanceIds": ["i-1", "i-2", "i-3", "i-4", "i-5"]})),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = records.iter().filter_map(|r| r["InstanceId"].as_str()).collect();
    assert_eq!(ids, vec!["i-1", "i-2", "i-3", "i-4", "i-5"]);

    let mut batch_sizes: Vec<usize> = remote
        .calls()
        .iter()
        .map(|call| call.params["InstanceIds"].as_array().map_or(0, Vec::len))
        .collect();
    batch_sizes.sort_unstable();
    assert_eq!(batch_sizes, vec![1, 2, 2]);
}

#[tokio::test]
async fn test_misaligned_fan_out_makes_no_calls() {
    let remote = instances_remote();
    let collector = collector(vec![accounts(), instances()], &remote);

    let result = collector
        .lookup_records(
            "Instances",
            bag(json!({"region": ["us-east-1", "eu-west-1", "ap-south-1"], "accountId": ["111", "222"]})),
        )
        .await;

    assert!(matches!(result, Err(CollectorError::ParameterAlignment { .. })));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_cycle_detected_before_any_call() {
    let remote = Arc::new(ScriptedRemote::new());
    let policies = Schema::builder("Policies", "listPolicies")
        .required_param("roleName", ParamDescriptor::new(1).default_source("Roles", ParamBag::new()))
        .value_path("Policies")
        .build()
        .unwrap();
    let roles = Schema::builder("Roles", "listRoles")
        .required_param("policyArn", ParamDescriptor::new(1).default_source("Policies", ParamBag::new()))
        .value_path("Roles")
        .build()
        .unwrap();
    let collector = collector(vec![policies, roles], &remote);

    let err = collector
        .lookup_records("Policies", ParamBag::new())
        .await
        .unwrap_err();

    match &err {
        CollectorError::CyclicDependency { path } => assert_eq!(path, &["Policies", "Roles", "Policies"]),
        other => panic!("expected cycle, got {:?}", other),
    }
    assert!(err.to_string().contains("Policies -> Roles -> Policies"));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_unresolvable_parameter_before_any_call() {
    let remote = instances_remote();
    let collector = collector(vec![accounts(), instances()], &remote);

    let result = collector.lookup_records("Instances", ParamBag::new()).await;

    assert!(matches!(
        result,
        Err(CollectorError::UnresolvableParameter { schema, param }) if schema == "Instances" && param == "region"
    ));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_sort_by_field_and_default_order() {
    let remote = Arc::new(ScriptedRemote::new().on("listUsers", |params, _| {
        let group = params["group"].as_str().unwrap_or_default();
        let users = match group {
            "admins" => json!([{"UserName": "zoe"}, {"UserName": "adam"}]),
            _ => json!([{"UserName": "mia"}]),
        };
        Ok(json!({"Users": users}))
    }));
    let unsorted = Schema::builder("Users", "listUsers")
        .required_param("group", ParamDescriptor::new(1))
        .value_path("Users")
        .build()
        .unwrap();
    let sorted = Schema::builder("SortedUsers", "listUsers")
        .required_param("group", ParamDescriptor::new(1))
        .value_path("Users")
        .sort_by_field("UserName")
        .build()
        .unwrap();
    let collector = collector(vec![unsorted, sorted], &remote);
    let params = bag(json!({"group": ["admins", "devs"]}));

    let records = collector.lookup_records("Users", params.clone()).await.unwrap();
    let names: Vec<&str> = records.iter().filter_map(|r| r["UserName"].as_str()).collect();
    assert_eq!(names, vec!["zoe", "adam", "mia"]);

    let records = collector.lookup_records("SortedUsers", params).await.unwrap();
    let names: Vec<&str> = records.iter().filter_map(|r| r["UserName"].as_str()).collect();
    assert_eq!(names, vec!["adam", "mia", "zoe"]);
}

#[tokio::test]
async fn test_deadline_bounds_the_request() {
    let remote = Arc::new(ScriptedRemote::new().on("listAccounts", |_, _| Err(RemoteError::transient("slow down"))));
    let mut registry = SchemaRegistry::new();
    registry.register(accounts()).unwrap();
    let config = CollectorConfig {
        retry_interval_ms: 60_000,
        ..CollectorConfig::default()
    };
    let collector = Collector::with_config(registry, remote.clone(), config);

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));
    let result = collector.lookup_records_with("Accounts", ParamBag::new(), ctx).await;

    assert!(matches!(
        result,
        Err(CollectorError::DeadlineExceeded { schema }) if schema == "Accounts"
    ));
    assert!(remote.calls().len() < 10);
}

#[tokio::test]
async fn test_cancelled_request_makes_no_calls() {
    let remote = instances_remote();
    let collector = collector(vec![accounts(), instances()], &remote);

    let token = CancellationToken::new();
    token.cancel();
    let ctx = RequestContext::new().with_cancellation(token);

    let result = collector
        .lookup_records_with("Instances", bag(json!({"region": "us-east-1"})), ctx)
        .await;

    assert!(matches!(result, Err(CollectorError::Cancelled { .. })));
    assert!(remote.calls().is_empty());
}
