/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Functionality for using [`tokio`](https://crates.io/crates/tokio) as the endpoint's async
runtime implementation.
 */

use crate::client::*;
use crate::client::shared_impl::*;
use crate::error::{SchistError, SchistResult};
use crate::protocol::is_connection_established;

use log::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, split, WriteHalf};
use tokio::runtime;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

type TokioConnectionFactoryReturnType<T> = Pin<Box<dyn Future<Output = SchistResult<T>> + Send>>;

/// Tokio-specific endpoint configuration
pub struct TokioEndpointOptions<T> where T : AsyncRead + AsyncWrite + Send + Sync {

    /// Factory function for creating the final connection object based on all the various
    /// configuration options and features.  It might be a TcpStream, it might be a TlsStream,
    /// it might be some nested combination.
    ///
    /// Ultimately, the type must implement AsyncRead and AsyncWrite.
    pub connection_factory: Box<dyn Fn() -> TokioConnectionFactoryReturnType<T> + Send + Sync>,
}

macro_rules! submit_async_endpoint_operation {
    ($self:ident, $operation_type:ident, $options_internal_type: ident, $options_value: expr, $packet_value: expr) => ({

        let (response_sender, rx) = tokio::sync::oneshot::channel();
        let response_handler = Box::new(move |res| {
            if response_sender.send(res).is_err() {
                return Err(crate::error::SchistError::new_operation_channel_failure("failed to deliver operation result to its waiting future"));
            }

            Ok(())
        });
        let internal_options = $options_internal_type {
            options : $options_value,
            response_handler : Some(response_handler)
        };
        let send_result = $self.user_state.try_send(crate::client::shared_impl::OperationOptions::$operation_type($packet_value, internal_options));
        Box::pin(async move {
            match send_result {
                Err(error) => {
                    Err(error)
                }
                _ => {
                    rx.await?
                }
            }
        })
    })
}

pub(crate) use submit_async_endpoint_operation;

pub(crate) struct UserRuntimeState {
    operation_sender: UnboundedSender<OperationOptions>
}

impl UserRuntimeState {
    pub(crate) fn try_send(&self, operation_options: OperationOptions) -> SchistResult<()> {
        if self.operation_sender.send(operation_options).is_err() {
            return Err(SchistError::new_operation_channel_failure("failed to submit operation to endpoint channel"));
        }

        Ok(())
    }
}

pub(crate) struct EndpointRuntimeState<T> where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
    tokio_config: TokioEndpointOptions<T>,
    operation_receiver: tokio::sync::mpsc::UnboundedReceiver<OperationOptions>,
    stream: Option<T>
}

impl<T> EndpointRuntimeState<T> where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
    pub(crate) async fn process_stopped(&mut self, endpoint: &mut EndpointImpl) -> SchistResult<EndpointImplState> {
        loop {
            trace!("tokio - process_stopped loop");

            tokio::select! {
                operation_result = self.operation_receiver.recv() => {
                    if let Some(operation_options) = operation_result {
                        debug!("tokio - process_stopped - user operation received");
                        endpoint.handle_incoming_operation(operation_options, Instant::now());
                    }
                }
            }

            if let Some(transition_state) = endpoint.compute_optional_state_transition() {
                return Ok(transition_state);
            }
        }
    }

    pub(crate) async fn process_connecting(&mut self, endpoint: &mut EndpointImpl) -> SchistResult<EndpointImplState> {
        let mut connect = (self.tokio_config.connection_factory)();

        let timeout = sleep(*endpoint.connect_timeout());
        tokio::pin!(timeout);

        loop {
            trace!("tokio - process_connecting loop");

            tokio::select! {
                operation_result = self.operation_receiver.recv() => {
                    if let Some(operation_options) = operation_result {
                        debug!("tokio - process_connecting - user operation received");
                        endpoint.handle_incoming_operation(operation_options, Instant::now());
                    }
                }
                () = &mut timeout => {
                    info!("tokio - process_connecting - transport connection timeout exceeded");
                    endpoint.apply_error(SchistError::new_connection_establishment_failure("transport connection timeout reached"));
                    return Ok(EndpointImplState::PendingReconnect);
                }
                connection_result = &mut connect => {
                    match connection_result {
                        Ok(stream) => {
                            info!("tokio - process_connecting - transport connection established successfully");
                            self.stream = Some(stream);
                            return Ok(EndpointImplState::Connected);
                        }
                        Err(error) => {
                            info!("tokio - process_connecting - transport connection establishment failed");
                            endpoint.apply_error(SchistError::new_connection_establishment_failure(error));
                            return Ok(EndpointImplState::PendingReconnect);
                        }
                    }
                }
            }

            if let Some(transition_state) = endpoint.compute_optional_state_transition() {
                return Ok(transition_state);
            }
        }
    }

    pub(crate) async fn process_connected(&mut self, endpoint: &mut EndpointImpl) -> SchistResult<EndpointImplState> {
        let read_buffer_size = endpoint.read_buffer_size();
        let mut outbound_data: Vec<u8> = Vec::with_capacity(read_buffer_size);
        let mut cumulative_bytes_written : usize = 0;

        let mut inbound_data = vec![0u8; read_buffer_size];

        let stream = self.stream.take().unwrap();
        let (stream_reader, mut stream_writer) = split(stream);
        tokio::pin!(stream_reader);

        let mut should_flush = false;
        let mut write_directive : Option<WriteDirective>;

        let mut next_state = None;
        while next_state.is_none() {
            trace!("tokio - process_connected loop");

            let next_service_time_option = endpoint.get_next_connected_service_time(Instant::now());
            let service_wait: Option<tokio::time::Sleep> = next_service_time_option.map(|next_service_time| sleep(next_service_time.saturating_duration_since(Instant::now())));

            let outbound_slice_option: Option<&[u8]> =
                if cumulative_bytes_written < outbound_data.len() {
                    Some(&outbound_data[cumulative_bytes_written..])
                } else {
                    None
                };

            if should_flush {
                debug!("tokio - process_connected - flushing previous write");
                write_directive = Some(WriteDirective::Flush);
            } else if let Some(outbound_slice) = outbound_slice_option {
                debug!("tokio - process_connected - {} bytes to write", outbound_slice.len());
                write_directive = Some(WriteDirective::Bytes(outbound_slice))
            } else {
                debug!("tokio - process_connected - nothing to write");
                write_directive = None;
            }

            tokio::select! {
                // incoming user operations future
                operation_result = self.operation_receiver.recv() => {
                    if let Some(operation_options) = operation_result {
                        debug!("tokio - process_connected - user operation received");
                        endpoint.handle_incoming_operation(operation_options, Instant::now());
                    }
                }
                // incoming data on the socket future
                read_result = stream_reader.read(inbound_data.as_mut_slice()) => {
                    match read_result {
                        Ok(bytes_read) => {
                            debug!("tokio - process_connected - read {} bytes from connection stream", bytes_read);

                            if bytes_read == 0 {
                                info!("tokio - process_connected - connection closed for read (0 bytes)");
                                endpoint.apply_error(SchistError::new_connection_closed("transport stream closed"));
                                next_state = Some(EndpointImplState::PendingReconnect);
                            } else if let Err(error) = endpoint.handle_incoming_bytes(&inbound_data[..bytes_read], Instant::now()) {
                                info!("tokio - process_connected - error handling incoming bytes: {:?}", error);
                                endpoint.apply_error(error);
                                next_state = Some(EndpointImplState::PendingReconnect);
                            }
                        }
                        Err(error) => {
                            info!("tokio - process_connected - connection stream read failed: {:?}", error);
                            if is_connection_established(endpoint.get_protocol_state()) {
                                endpoint.apply_error(SchistError::new_transport_error(error));
                            } else {
                                endpoint.apply_error(SchistError::new_connection_establishment_failure(error));
                            }
                            next_state = Some(EndpointImplState::PendingReconnect);
                        }
                    }
                }
                // endpoint service future (if relevant)
                Some(_) = conditional_wait(service_wait) => {
                    debug!("tokio - process_connected - running endpoint service task");
                    if let Err(error) = endpoint.handle_service(&mut outbound_data, Instant::now()) {
                        endpoint.apply_error(error);
                        next_state = Some(EndpointImplState::PendingReconnect);
                    }
                }
                // outbound data future (if relevant)
                Some(bytes_written_result) = conditional_write(write_directive, &mut stream_writer) => {
                    match bytes_written_result {
                        Ok(bytes_written) => {
                            debug!("tokio - process_connected - wrote {} bytes to connection stream", bytes_written);
                            if should_flush {
                                should_flush = false;
                                if let Err(error) = endpoint.handle_write_completion(Instant::now()) {
                                    info!("tokio - process_connected - stream write completion handler failed: {:?}", error);
                                    endpoint.apply_error(error);
                                    next_state = Some(EndpointImplState::PendingReconnect);
                                }
                            } else {
                                cumulative_bytes_written += bytes_written;
                                if cumulative_bytes_written == outbound_data.len() {
                                    outbound_data.clear();
                                    cumulative_bytes_written = 0;
                                    should_flush = true;
                                }
                            }
                        }
                        Err(error) => {
                            info!("tokio - process_connected - connection stream write failed: {:?}", error);
                            if is_connection_established(endpoint.get_protocol_state()) {
                                endpoint.apply_error(SchistError::new_transport_error(error));
                            } else {
                                endpoint.apply_error(SchistError::new_connection_establishment_failure(error));
                            }
                            next_state = Some(EndpointImplState::PendingReconnect);
                        }
                    }
                }
            }

            if next_state.is_none() {
                next_state = endpoint.compute_optional_state_transition();
            }
        }

        info!("tokio - process_connected - shutting down stream");
        let _ = stream_writer.shutdown().await;
        info!("tokio - process_connected - stream fully closed");

        Ok(next_state.unwrap())
    }

    pub(crate) async fn process_pending_reconnect(&mut self, endpoint: &mut EndpointImpl, wait: Duration) -> SchistResult<EndpointImplState> {
        let reconnect_timer = sleep(wait);
        tokio::pin!(reconnect_timer);

        loop {
            trace!("tokio - process_pending_reconnect loop");

            tokio::select! {
                operation_result = self.operation_receiver.recv() => {
                    if let Some(operation_options) = operation_result {
                        debug!("tokio - process_pending_reconnect - user operation received");
                        endpoint.handle_incoming_operation(operation_options, Instant::now());
                    }
                }
                () = &mut reconnect_timer => {
                    info!("tokio - process_pending_reconnect - reconnect timer exceeded");
                    return Ok(EndpointImplState::Connecting);
                }
            }

            if let Some(transition_state) = endpoint.compute_optional_state_transition() {
                return Ok(transition_state);
            }
        }
    }
}

async fn conditional_wait(wait_option: Option<tokio::time::Sleep>) -> Option<()> {
    match wait_option {
        Some(timer) => {
            timer.await;
            Some(())
        },
        None => None,
    }
}

enum WriteDirective<'a> {
    Bytes(&'a[u8]),
    Flush
}

async fn conditional_write<'a, T>(directive: Option<WriteDirective<'a>>, writer: &mut WriteHalf<T>) -> Option<std::io::Result<usize>> where T : AsyncRead + AsyncWrite {
    match directive {
        Some(WriteDirective::Bytes(bytes)) => {
            Some(writer.write(bytes).await)
        }
        Some(WriteDirective::Flush) => {
            if let Err(error) = writer.flush().await {
                Some(Err(error))
            } else {
                Some(Ok(0))
            }
        }
        _ => { None }
    }
}

async fn endpoint_event_loop<T>(endpoint_impl: &mut EndpointImpl, runtime_state: &mut EndpointRuntimeState<T>) where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
    let mut done = false;
    while !done {
        let current_state = endpoint_impl.get_current_state();
        let next_state_result =
            match current_state {
                EndpointImplState::Stopped => { runtime_state.process_stopped(endpoint_impl).await }
                EndpointImplState::Connecting => { runtime_state.process_connecting(endpoint_impl).await }
                EndpointImplState::Connected => { runtime_state.process_connected(endpoint_impl).await }
                EndpointImplState::PendingReconnect => {
                    let reconnect_wait = endpoint_impl.compute_reconnect_period();
                    runtime_state.process_pending_reconnect(endpoint_impl, reconnect_wait).await
                }
                _ => { Ok(EndpointImplState::Shutdown) }
            };

        done = true;
        if let Ok(next_state) = next_state_result {
            if endpoint_impl.transition_to_state(next_state, Instant::now()).is_ok() && (next_state != EndpointImplState::Shutdown) {
                done = false;
            }
        }
    }

    info!("Async endpoint loop exiting");
}

pub(crate) fn spawn_endpoint_impl<T>(
    mut endpoint_impl: EndpointImpl,
    mut runtime_state: EndpointRuntimeState<T>,
    runtime_handle: &runtime::Handle,
) where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
    runtime_handle.spawn(async move {
        endpoint_event_loop(&mut endpoint_impl, &mut runtime_state).await;
    });
}

pub(crate) fn spawn_event_callback(event: Arc<EndpointEvent>, listener: EndpointEventListener) {
    match listener {
        EndpointEventListener::Callback(callback) => {
            tokio::spawn(async move {
                (callback)(event)
            });
        }
    }
}

pub(crate) fn create_runtime_states<T>(tokio_config: TokioEndpointOptions<T>) -> (UserRuntimeState, EndpointRuntimeState<T>) where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();

    let user_state = UserRuntimeState {
        operation_sender: sender
    };

    let runtime_state = EndpointRuntimeState {
        tokio_config,
        operation_receiver: receiver,
        stream: None
    };

    (user_state, runtime_state)
}
