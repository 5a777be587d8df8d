//! Integration tests for the AWS client against a mock HTTP server.

use hzdeploy_cloud::aws::{Aws, Credentials};
use hzdeploy_cloud::{CloudProviderError, ComputeProvider, InstanceState, LaunchRequest, ObjectStore};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUN_INSTANCES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RunInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>run-req-1</requestId>
    <reservationId>r-0a1b2c3d</reservationId>
    <ownerId>123456789012</ownerId>
    <groupSet/>
    <instancesSet>
        <item>
            <instanceId>i-master</instanceId>
            <imageId>ami-799f7010</imageId>
            <instanceState><code>0</code><name>pending</name></instanceState>
            <privateDnsName/>
            <dnsName/>
            <instanceType>m1.small</instanceType>
        </item>
        <item>
            <instanceId>i-second</instanceId>
            <imageId>ami-799f7010</imageId>
            <instanceState><code>0</code><name>pending</name></instanceState>
            <privateDnsName/>
            <dnsName/>
            <instanceType>m1.small</instanceType>
        </item>
    </instancesSet>
</RunInstancesResponse>"#;

const DESCRIBE_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>desc-req-1</requestId>
    <reservationSet>
        <item>
            <reservationId>r-0a1b2c3d</reservationId>
            <instancesSet>
                <item>
                    <instanceId>i-master</instanceId>
                    <imageId>ami-799f7010</imageId>
                    <instanceState><code>16</code><name>running</name></instanceState>
                    <privateDnsName>ip-10-0-0-5.ec2.internal</privateDnsName>
                    <dnsName>ec2-54-0-0-5.compute-1.amazonaws.com</dnsName>
                    <instanceType>m1.small</instanceType>
                    <placement><availabilityZone>us-east-1a</availabilityZone></placement>
                </item>
            </instancesSet>
        </item>
    </reservationSet>
</DescribeInstancesResponse>"#;

/// A `DescribeInstances` page holding one running instance.
fn describe_page(instance_id: &str, next_token: Option<&str>) -> String {
    let next_token = next_token
        .map(|t| format!("<nextToken>{t}</nextToken>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>desc-{instance_id}</requestId>
    <reservationSet>
        <item>
            <reservationId>r-{instance_id}</reservationId>
            <instancesSet>
                <item>
                    <instanceId>{instance_id}</instanceId>
                    <imageId>ami-799f7010</imageId>
                    <instanceState><code>16</code><name>running</name></instanceState>
                    <privateDnsName>ip-{instance_id}.ec2.internal</privateDnsName>
                    <instanceType>m1.small</instanceType>
                </item>
            </instancesSet>
        </item>
    </reservationSet>
    {next_token}
</DescribeInstancesResponse>"#
    )
}

fn client(server: &MockServer) -> Aws {
    Aws::new(Credentials::new("AKIDEXAMPLE", "secret"), "us-east-1")
        .unwrap()
        .with_ec2_endpoint(server.uri())
        .with_s3_endpoint(server.uri())
}

fn launch_request(count: u32) -> LaunchRequest {
    LaunchRequest {
        image_id: "ami-799f7010".to_string(),
        instance_type: "m1.small".to_string(),
        count,
        key_pair: "start".to_string(),
        security_groups: vec!["default".to_string()],
        zone: "us-east-1a".to_string(),
    }
}

mod ec2 {
    use super::*;

    #[tokio::test]
    async fn test_run_instances_sends_signed_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(body_string_contains("Action=RunInstances"))
            .and(body_string_contains("MinCount=2"))
            .and(body_string_contains("MaxCount=2"))
            .and(body_string_contains("KeyName=start"))
            .and(body_string_contains("SecurityGroup.1=default"))
            .and(body_string_contains("Placement.AvailabilityZone=us-east-1a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RUN_INSTANCES))
            .expect(1)
            .mount(&server)
            .await;

        let reservation = client(&server)
            .create_instances(&launch_request(2))
            .await
            .unwrap();

        assert_eq!(reservation.request_id, "run-req-1");
        assert_eq!(reservation.reservation_id.as_deref(), Some("r-0a1b2c3d"));
        assert_eq!(reservation.instance_ids, vec!["i-master", "i-second"]);
    }

    #[tokio::test]
    async fn test_run_instances_error_carries_diagnostics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Response><Errors><Error><Code>InvalidAMIID.Malformed</Code><Message>Invalid id: "ami-nope"</Message></Error></Errors><RequestID>err-req-9</RequestID></Response>"#,
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_instances(&launch_request(1))
            .await
            .unwrap_err();

        let service = err.service().expect("service error");
        assert_eq!(service.status, 400);
        assert_eq!(service.code, "InvalidAMIID.Malformed");
        assert_eq!(service.request_id.as_deref(), Some("err-req-9"));
    }

    #[tokio::test]
    async fn test_describe_instance_maps_addresses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=DescribeInstances"))
            .and(body_string_contains("InstanceId.1=i-master"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DESCRIBE_ONE))
            .mount(&server)
            .await;

        let instance = client(&server).describe_instance("i-master").await.unwrap();

        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(
            instance.private_address.as_deref(),
            Some("ip-10-0-0-5.ec2.internal")
        );
        assert_eq!(
            instance.public_address.as_deref(),
            Some("ec2-54-0-0-5.compute-1.amazonaws.com")
        );
    }

    #[tokio::test]
    async fn test_describe_ignores_other_instances_in_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("InstanceId.1=i-other"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DESCRIBE_ONE))
            .mount(&server)
            .await;

        let err = client(&server).describe_instance("i-other").await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_describe_unknown_instance_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<Response><Errors><Error><Code>InvalidInstanceID.NotFound</Code>\
                 <Message>The instance ID 'i-gone' does not exist</Message></Error></Errors>\
                 <RequestID>nf-req</RequestID></Response>",
            ))
            .mount(&server)
            .await;

        let err = client(&server).describe_instance("i-gone").await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_list_running_instances_uses_state_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Filter.1.Name=instance-state-name"))
            .and(body_string_contains("Filter.1.Value.1=running"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DESCRIBE_ONE))
            .expect(1)
            .mount(&server)
            .await;

        let instances = client(&server)
            .list_instances(Some(InstanceState::Running))
            .await
            .unwrap();

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "i-master");
    }

    #[tokio::test]
    async fn test_list_instances_follows_next_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=DescribeInstances"))
            .and(body_string_contains("NextToken=page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(describe_page("i-b", None)))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=DescribeInstances"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(describe_page("i-a", Some("page-2"))),
            )
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let instances = client(&server)
            .list_instances(Some(InstanceState::Running))
            .await
            .unwrap();

        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i-a", "i-b"]);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let second = String::from_utf8(requests[1].body.clone()).unwrap();
        assert!(second.contains("NextToken=page-2"));
        assert!(second.contains("Filter.1.Value.1=running"));
    }

    #[tokio::test]
    async fn test_reboot_lists_every_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Action=RebootInstances"))
            .and(body_string_contains("Version=2016-11-15"))
            .and(body_string_contains("InstanceId.1=i-a"))
            .and(body_string_contains("InstanceId.2=i-b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<RebootInstancesResponse><requestId>rb-1</requestId><return>true</return></RebootInstancesResponse>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .reboot_instances(&["i-a".to_string(), "i-b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminate_lists_every_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=TerminateInstances"))
            .and(body_string_contains("InstanceId.1=i-a"))
            .and(body_string_contains("InstanceId.2=i-b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<TerminateInstancesResponse><requestId>t-1</requestId></TerminateInstancesResponse>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .terminate_instances(&["i-a".to_string(), "i-b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_terminate_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        client(&server).terminate_instances(&[]).await.unwrap();
        client(&server).reboot_instances(&[]).await.unwrap();
    }
}

mod s3 {
    use super::*;

    #[tokio::test]
    async fn test_put_object_sends_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/hazelcast/hazelcast.xml"))
            .and(header("content-type", "text/plain"))
            .and(header("content-length", "5"))
            .and(header_exists("x-amz-content-sha256"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .put_object("hazelcast", "hazelcast.xml", b"<a/>\n".to_vec(), "text/plain")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_object_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/hazelcast/hazelcast.zip"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete_object("hazelcast", "hazelcast.zip")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_object_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hazelcast/hazelcast.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let body = client(&server)
            .get_object("hazelcast", "hazelcast.xml")
            .await
            .unwrap();
        assert_eq!(body, b"payload");
    }

    #[tokio::test]
    async fn test_access_denied_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-amz-request-id", "hdr-req")
                    .set_body_string(
                        "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                    ),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .put_object("hazelcast", "hazelcast.zip", vec![1, 2, 3], "application/zip")
            .await
            .unwrap_err();

        match err {
            CloudProviderError::Service(service) => {
                assert_eq!(service.status, 403);
                assert_eq!(service.code, "AccessDenied");
                assert_eq!(service.request_id.as_deref(), Some("hdr-req"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
