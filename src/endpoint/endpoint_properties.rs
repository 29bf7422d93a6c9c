// Location-constraint classification properties.
