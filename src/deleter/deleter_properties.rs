// Batch partitioning and delete-request body properties.
