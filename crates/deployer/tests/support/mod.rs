//! In-memory compute and object store that records every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hzdeploy_cloud::{
    CloudProviderError, ComputeProvider, Instance, InstanceState, LaunchRequest, ObjectStore,
    Reservation, ServiceError,
};

/// One provider call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { count: u32, instance_type: String, image_id: String },
    Describe(String),
    List,
    Terminate(Vec<String>),
    Reboot(Vec<String>),
    Delete { bucket: String, key: String },
    Put { bucket: String, key: String, content_type: String, length: usize },
    Get { bucket: String, key: String },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    next_id: u32,
    describes: HashMap<String, u32>,
    launched: Vec<String>,
    running: Vec<Instance>,
    objects: HashMap<(String, String), (Vec<u8>, String)>,
    polls_until_ready: u32,
    fail_create: Option<ServiceError>,
    fail_put: Option<ServiceError>,
    fail_terminate: Option<ServiceError>,
}

/// Fake cloud implementing both provider seams.
///
/// Launched instances report no private address until they have been
/// described `polls_until_ready` times.
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

pub fn service_error(status: u16, code: &str) -> ServiceError {
    ServiceError {
        status,
        code: code.to_string(),
        message: format!("{code} from fake"),
        request_id: Some(format!("req-{code}")),
    }
}

pub fn private_address(id: &str) -> String {
    format!("ip-{id}.ec2.internal")
}

pub fn running(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        image_id: "ami-799f7010".to_string(),
        instance_type: "m1.small".to_string(),
        state: InstanceState::Running,
        private_address: Some(private_address(id)),
        public_address: Some(format!("ec2-{id}.compute-1.amazonaws.com")),
        zone: Some("us-east-1a".to_string()),
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances become addressable on their `polls`-th describe.
    #[must_use]
    pub fn with_polls_until_ready(self, polls: u32) -> Self {
        self.state.lock().unwrap().polls_until_ready = polls;
        self
    }

    #[must_use]
    pub fn with_running(self, ids: &[&str]) -> Self {
        self.state.lock().unwrap().running = ids.iter().map(|id| running(id)).collect();
        self
    }

    #[must_use]
    pub fn with_object(self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.state.lock().unwrap().objects.insert(
            (bucket.to_string(), key.to_string()),
            (body.to_vec(), "application/octet-stream".to_string()),
        );
        self
    }

    #[must_use]
    pub fn failing_create(self, err: ServiceError) -> Self {
        self.state.lock().unwrap().fail_create = Some(err);
        self
    }

    #[must_use]
    pub fn failing_put(self, err: ServiceError) -> Self {
        self.state.lock().unwrap().fail_put = Some(err);
        self
    }

    #[must_use]
    pub fn failing_terminate(self, err: ServiceError) -> Self {
        self.state.lock().unwrap().fail_terminate = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn compute(&self) -> Arc<dyn ComputeProvider> {
        Arc::new(self.clone())
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ComputeProvider for FakeCloud {
    async fn create_instances(
        &self,
        req: &LaunchRequest,
    ) -> Result<Reservation, CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            count: req.count,
            instance_type: req.instance_type.clone(),
            image_id: req.image_id.clone(),
        });
        if let Some(err) = state.fail_create.clone() {
            return Err(CloudProviderError::Service(err));
        }

        let mut instance_ids = Vec::new();
        for _ in 0..req.count {
            state.next_id += 1;
            let id = format!("i-{:04}", state.next_id);
            state.launched.push(id.clone());
            instance_ids.push(id);
        }
        Ok(Reservation {
            request_id: format!("req-create-{}", state.calls.len()),
            reservation_id: Some("r-fake".to_string()),
            instance_ids,
        })
    }

    async fn describe_instance(&self, id: &str) -> Result<Instance, CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Describe(id.to_string()));
        if !state.launched.iter().any(|l| l == id) {
            return Err(CloudProviderError::NotFound(id.to_string()));
        }

        let ready_after = state.polls_until_ready.max(1);
        let seen = state.describes.entry(id.to_string()).or_insert(0);
        *seen += 1;

        let mut instance = running(id);
        if *seen < ready_after {
            instance.state = InstanceState::Pending;
            instance.private_address = None;
            instance.public_address = None;
        }
        Ok(instance)
    }

    async fn list_instances(
        &self,
        state_filter: Option<InstanceState>,
    ) -> Result<Vec<Instance>, CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        Ok(state
            .running
            .iter()
            .filter(|i| state_filter.map_or(true, |s| i.state == s))
            .cloned()
            .collect())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Terminate(ids.to_vec()));
        if let Some(err) = state.fail_terminate.clone() {
            return Err(CloudProviderError::Service(err));
        }
        state.running.retain(|i| !ids.contains(&i.id));
        Ok(())
    }

    async fn reboot_instances(&self, ids: &[String]) -> Result<(), CloudProviderError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::Reboot(ids.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            length: body.len(),
        });
        if let Some(err) = state.fail_put.clone() {
            return Err(CloudProviderError::Service(err));
        }
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            (body, content_type.to_string()),
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| CloudProviderError::NotFound(format!("{bucket}/{key}")))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), CloudProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        // Report missing keys so callers must tolerate them.
        match state.objects.remove(&(bucket.to_string(), key.to_string())) {
            Some(_) => Ok(()),
            None => Err(CloudProviderError::NotFound(format!("{bucket}/{key}"))),
        }
    }
}
