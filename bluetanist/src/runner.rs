//! Dispatch loop of a mesh node.
//!
//! Transport events, local attribute requests and coordinator deadlines are all served
//! from [`run_mesh`], so the peer store is never shared with another context.

use embassy_futures::select::{Either3, select3};
use embassy_time::{Instant, Timer};

use crate::channel::{LOCAL_REQUEST_CHANNEL, LOCAL_REQUEST_MUTEX, LOCAL_RESPONSE, MESH_EVENT_CHANNEL};
use crate::coordinator::Coordinator;
use crate::server::{LocalAttributeServer, LocalRequest, LocalResponse};
use crate::transport::{AttributeClient, LinkLayer};

/// Run the node: apply the configured role, then dispatch forever
pub async fn run_mesh<L: LinkLayer, G: AttributeClient>(
    coordinator: &mut Coordinator<'_, L, G>,
    server: &mut LocalAttributeServer<'_>,
) -> ! {
    let role = coordinator.config().initial_role;
    server.apply_role(role, coordinator, Instant::now());

    loop {
        let deadline = coordinator.next_deadline();
        match select3(
            MESH_EVENT_CHANNEL.receive(),
            LOCAL_REQUEST_CHANNEL.receive(),
            wait_deadline(deadline),
        )
        .await
        {
            Either3::First(event) => {
                trace!("Mesh event: {:?}", event);
                coordinator.handle_event(event, Instant::now());
            }
            Either3::Second(request) => {
                let response = server.handle_request(request, coordinator, Instant::now());
                LOCAL_RESPONSE.signal(response);
            }
            Either3::Third(_) => coordinator.on_timer(Instant::now()),
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => Timer::at(at).await,
        None => core::future::pending().await,
    }
}

/// Send a request to the node's own attribute table and wait for the answer.
///
/// Only completes while [`run_mesh`] is running.
pub async fn local_request(request: LocalRequest) -> LocalResponse {
    let _guard = LOCAL_REQUEST_MUTEX.lock().await;
    LOCAL_RESPONSE.reset();
    LOCAL_REQUEST_CHANNEL.send(request).await;
    LOCAL_RESPONSE.wait().await
}
