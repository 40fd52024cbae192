//! Wire types and the gRPC server stub for the `hemmer.provider.v1` protocol.

tonic::include_proto!("hemmer.provider.v1");
